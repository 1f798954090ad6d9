use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{anyhow, bail, Context, Result};
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum, ValueHint};
use covseg::{
    paint, rolling_mean, segment_by_sensor, Domain, Params, RuleSpec, Sample, SensorSample,
    SensorTimeline,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

#[derive(Parser, Debug)]
#[command(author, version, about = "Coverage run segmentation CLI", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Split each sensor's series into runs of equal coverage category
    Segment(SegmentArgs),
    /// Trailing rolling mean of each sensor's series
    Rolling(RollingArgs),
    /// Per-sensor sample counts, segment counts and mean coverage
    Summary(SummaryArgs),
}

#[derive(Args, Debug)]
struct InputArgs {
    /// CSV with `timestamp`, `value` and optional `sensor` columns (`-` for stdin)
    #[arg(value_hint = ValueHint::FilePath)]
    input: PathBuf,

    /// Sensor name for rows without a `sensor` column
    #[arg(long, default_value = "Sensor A")]
    sensor: String,

    /// Optional params JSON (rule, domain, ramp, rolling_window)
    #[arg(long, value_hint = ValueHint::FilePath)]
    config: Option<PathBuf>,

    /// Value domain as `lo,hi` (e.g. `0,1` or `0,100`)
    #[arg(long)]
    domain: Option<String>,

    /// Verbose logging
    #[arg(long, action = ArgAction::SetTrue)]
    verbose: bool,
}

#[derive(Args, Debug)]
struct RuleArgs {
    /// Exclusive upper bounds of the threshold bands (comma separated)
    #[arg(long, conflicts_with = "bins")]
    thresholds: Option<String>,

    /// Band labels, one more than the thresholds (comma separated)
    #[arg(long, requires = "thresholds")]
    labels: Option<String>,

    /// Use this many equal-width bins over the domain instead of thresholds
    #[arg(long)]
    bins: Option<usize>,

    /// Color ramp, low to high (comma separated)
    #[arg(long)]
    ramp: Option<String>,
}

#[derive(Parser, Debug)]
struct SegmentArgs {
    #[command(flatten)]
    input: InputArgs,

    #[command(flatten)]
    rule: RuleArgs,

    /// Output path (`-` for stdout)
    #[arg(short, long, default_value = "segments.csv", value_hint = ValueHint::FilePath)]
    output: PathBuf,

    /// Output format
    #[arg(long, value_enum, default_value_t = OutputFormat::Csv)]
    format: OutputFormat,
}

#[derive(Parser, Debug)]
struct RollingArgs {
    #[command(flatten)]
    input: InputArgs,

    /// Window length in samples (defaults to the config's rolling_window)
    #[arg(long)]
    window: Option<usize>,

    /// Output path (`-` for stdout)
    #[arg(short, long, default_value = "rolling.csv", value_hint = ValueHint::FilePath)]
    output: PathBuf,
}

#[derive(Parser, Debug)]
struct SummaryArgs {
    #[command(flatten)]
    input: InputArgs,

    #[command(flatten)]
    rule: RuleArgs,

    /// Output path (`-` for stdout)
    #[arg(short, long, default_value = "-", value_hint = ValueHint::FilePath)]
    output: PathBuf,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Csv,
    Json,
}

#[derive(Debug, Deserialize)]
struct InputRow {
    #[serde(alias = "Date", alias = "date", alias = "Timestamp")]
    timestamp: String,
    #[serde(alias = "Coverage", alias = "coverage", alias = "Value")]
    value: f64,
    #[serde(default, alias = "Sensor")]
    sensor: Option<String>,
}

#[derive(Debug, Serialize)]
struct SegmentRow {
    sensor: String,
    start: String,
    end: String,
    category: String,
    aggregate: f64,
    sample_count: usize,
    color: String,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let verbose = match &cli.command {
        Command::Segment(args) => args.input.verbose,
        Command::Rolling(args) => args.input.verbose,
        Command::Summary(args) => args.input.verbose,
    };
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init();

    match cli.command {
        Command::Segment(args) => handle_segment(args),
        Command::Rolling(args) => handle_rolling(args),
        Command::Summary(args) => handle_summary(args),
    }
}

fn handle_segment(args: SegmentArgs) -> Result<()> {
    let params = load_params(&args.input, Some(&args.rule))?;
    let rule = params.build_rule()?;
    let ramp = params.color_ramp()?;
    let records = read_records(&args.input.input, &args.input.sensor)?;

    let t_segment = Instant::now();
    let timelines = segment_by_sensor(&records, &rule)?;
    let mut rows = Vec::new();
    for (sensor, timeline) in timelines {
        let painted = paint(timeline.segments, params.domain, ramp.colors())?;
        rows.extend(painted.into_iter().map(|p| SegmentRow {
            sensor: sensor.clone(),
            start: p.segment.start.format(TIMESTAMP_FORMAT).to_string(),
            end: p.segment.end.format(TIMESTAMP_FORMAT).to_string(),
            category: p.segment.category,
            aggregate: p.segment.aggregate,
            sample_count: p.segment.sample_count,
            color: p.color,
        }));
    }
    debug!(
        "Segment stage: {:.1} ms",
        t_segment.elapsed().as_secs_f64() * 1000.0
    );
    info!(
        "Segmented {} samples into {} segments",
        records.len(),
        rows.len()
    );

    let mut out = open_output(&args.output)?;
    match args.format {
        OutputFormat::Csv => write_segment_rows(&rows, &mut out)?,
        OutputFormat::Json => {
            serde_json::to_writer_pretty(&mut out, &rows)?;
            writeln!(out)?;
        }
    }
    out.flush()?;
    if args.output.as_os_str() != "-" {
        info!("Wrote segments: {}", args.output.display());
    }
    Ok(())
}

fn handle_rolling(args: RollingArgs) -> Result<()> {
    let params = load_params(&args.input, None)?;
    let window = args.window.unwrap_or(params.rolling_window);
    if window == 0 {
        bail!("--window must be > 0");
    }
    let records = read_records(&args.input.input, &args.input.sensor)?;

    let mut grouped: BTreeMap<&str, Vec<Sample<NaiveDateTime>>> = BTreeMap::new();
    for record in &records {
        grouped
            .entry(record.sensor.as_str())
            .or_default()
            .push(Sample::new(record.timestamp, record.value));
    }

    let mut out = open_output(&args.output)?;
    let mut writer = csv::Writer::from_writer(&mut out);
    writer.write_record(["sensor", "timestamp", "value"])?;
    let mut written = 0usize;
    for (sensor, samples) in &grouped {
        let rolled = rolling_mean(samples, window)?;
        if rolled.is_empty() {
            warn!(
                "{}: only {} samples, fewer than window {}",
                sensor,
                samples.len(),
                window
            );
        }
        for sample in &rolled {
            writer.write_record([
                sensor.to_string(),
                sample.timestamp.format(TIMESTAMP_FORMAT).to_string(),
                format!("{:.6}", sample.value),
            ])?;
        }
        written += rolled.len();
    }
    writer.flush()?;
    info!("Rolling mean over {} samples: {} rows", window, written);
    Ok(())
}

fn handle_summary(args: SummaryArgs) -> Result<()> {
    let params = load_params(&args.input, Some(&args.rule))?;
    let rule = params.build_rule()?;
    let records = read_records(&args.input.input, &args.input.sensor)?;
    let timelines = segment_by_sensor(&records, &rule)?;

    let mut out = open_output(&args.output)?;
    write_summary_rows(&timelines, params.domain, &mut out)?;
    for timeline in timelines.values() {
        info!(
            "{}: {} samples, {} segments",
            timeline.legend_label(params.domain),
            timeline.sample_count(),
            timeline.segments.len()
        );
    }
    Ok(())
}

/// Start from the config file (or defaults) and apply command-line overrides.
fn load_params(input: &InputArgs, rule: Option<&RuleArgs>) -> Result<Params> {
    let mut params = match input.config.as_ref() {
        Some(path) => {
            let text = fs::read_to_string(path)
                .with_context(|| format!("failed to read config {}", path.display()))?;
            serde_json::from_str(&text)
                .with_context(|| format!("{} is not a valid params file", path.display()))?
        }
        None => Params::default(),
    };

    if let Some(domain) = input.domain.as_ref() {
        params.domain = parse_domain(domain)?;
    }

    if let Some(rule) = rule {
        if let Some(bins) = rule.bins {
            params.rule = RuleSpec::EqualWidth { bins };
        }
        if let Some(thresholds) = rule.thresholds.as_ref() {
            let bounds = parse_number_list(thresholds)?;
            let labels = match rule.labels.as_ref() {
                Some(labels) => parse_token_list(labels),
                None => bail!("--thresholds requires --labels"),
            };
            params.rule = RuleSpec::Thresholds { bounds, labels };
        }
        if let Some(ramp) = rule.ramp.as_ref() {
            params.ramp = parse_token_list(ramp);
        }
    }

    params.validate().context("invalid segmentation parameters")?;
    debug!("Params: {:?}", params);
    Ok(params)
}

fn read_records(path: &Path, default_sensor: &str) -> Result<Vec<SensorSample<NaiveDateTime>>> {
    let source: Box<dyn Read> = if path.as_os_str() == "-" {
        Box::new(io::stdin())
    } else {
        Box::new(File::open(path).with_context(|| format!("failed to open {}", path.display()))?)
    };
    let mut reader = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(source);

    let mut records = Vec::new();
    let mut last_seen: BTreeMap<String, NaiveDateTime> = BTreeMap::new();
    let mut out_of_order = 0usize;
    for (idx, row) in reader.deserialize::<InputRow>().enumerate() {
        let row = row.with_context(|| format!("{}: bad row {}", path.display(), idx + 1))?;
        let timestamp = parse_timestamp(&row.timestamp)
            .with_context(|| format!("{}: row {}", path.display(), idx + 1))?;
        let sensor = row
            .sensor
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| default_sensor.to_string());
        if let Some(prev) = last_seen.insert(sensor.clone(), timestamp) {
            if timestamp < prev {
                out_of_order += 1;
            }
        }
        records.push(SensorSample {
            sensor,
            timestamp,
            value: row.value,
        });
    }

    if out_of_order > 0 {
        warn!(
            "{}: {} rows are earlier than the previous row of the same sensor; kept in file order",
            path.display(),
            out_of_order
        );
    }
    info!(
        "Read {} samples for {} sensors from {}",
        records.len(),
        last_seen.len(),
        path.display()
    );
    Ok(records)
}

fn parse_timestamp(raw: &str) -> Result<NaiveDateTime> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Ok(dt.naive_utc());
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(raw, fmt) {
            return Ok(dt);
        }
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .ok_or_else(|| anyhow!("unrecognised timestamp '{}'", raw))
}

fn parse_domain(input: &str) -> Result<Domain> {
    let bounds = parse_number_list(input)?;
    match bounds.as_slice() {
        [lo, hi] => Ok(Domain::new(*lo, *hi)?),
        _ => Err(anyhow!("--domain expects 'lo,hi', got '{}'", input)),
    }
}

fn parse_number_list(input: &str) -> Result<Vec<f64>> {
    input
        .split(',')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(|t| {
            t.parse::<f64>()
                .with_context(|| format!("invalid number '{}'", t))
        })
        .collect()
}

fn parse_token_list(input: &str) -> Vec<String> {
    input
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

fn open_output(path: &Path) -> Result<Box<dyn Write>> {
    if path.as_os_str() == "-" {
        return Ok(Box::new(io::stdout().lock()));
    }
    let file =
        File::create(path).with_context(|| format!("failed to create {}", path.display()))?;
    Ok(Box::new(io::BufWriter::new(file)))
}

fn write_segment_rows<W: Write>(rows: &[SegmentRow], out: W) -> Result<()> {
    let mut writer = csv::Writer::from_writer(out);
    writer.write_record([
        "sensor",
        "start",
        "end",
        "category",
        "aggregate",
        "sample_count",
        "color",
    ])?;
    for row in rows {
        writer.write_record([
            row.sensor.clone(),
            row.start.clone(),
            row.end.clone(),
            row.category.clone(),
            format!("{:.6}", row.aggregate),
            row.sample_count.to_string(),
            row.color.clone(),
        ])?;
    }
    writer.flush()?;
    Ok(())
}

fn write_summary_rows<W: Write>(
    timelines: &BTreeMap<String, SensorTimeline<NaiveDateTime, String>>,
    domain: Domain,
    out: W,
) -> Result<()> {
    let mut writer = csv::Writer::from_writer(out);
    writer.write_record(["sensor", "samples", "segments", "mean", "legend"])?;
    for (sensor, timeline) in timelines {
        writer.write_record([
            sensor.clone(),
            timeline.sample_count().to_string(),
            timeline.segments.len().to_string(),
            format!("{:.6}", timeline.mean_value),
            timeline.legend_label(domain),
        ])?;
    }
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use covseg::{ClassificationRule, ConfiguredRule};
    use tempfile::tempdir;

    fn input_args() -> InputArgs {
        InputArgs {
            input: PathBuf::from("-"),
            sensor: "Sensor A".into(),
            config: None,
            domain: None,
            verbose: false,
        }
    }

    fn csv_input(dir: &Path, name: &str, body: &str) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, body).unwrap();
        path
    }

    fn day(d: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, d)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
    }

    fn rule_args() -> RuleArgs {
        RuleArgs {
            thresholds: None,
            labels: None,
            bins: None,
            ramp: None,
        }
    }

    #[test]
    fn timestamps_accept_common_formats() {
        let midnight = NaiveDate::from_ymd_opt(2024, 1, 2)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        assert_eq!(parse_timestamp("2024-01-02").unwrap(), midnight);
        assert_eq!(parse_timestamp("2024-01-02 00:00:00").unwrap(), midnight);
        assert_eq!(parse_timestamp("2024-01-02T00:00:00").unwrap(), midnight);
        assert_eq!(parse_timestamp("2024-01-02T01:00:00+01:00").unwrap(), midnight);
        assert!(parse_timestamp("yesterday").is_err());
    }

    #[test]
    fn domain_flag_parses_pairs() {
        assert_eq!(parse_domain("0,100").unwrap(), Domain::PERCENT);
        assert!(parse_domain("0").is_err());
        assert!(parse_domain("1,0").is_err());
        assert!(parse_domain("a,b").is_err());
    }

    #[test]
    fn rule_flags_override_defaults() {
        let mut rule = rule_args();
        rule.thresholds = Some("50, 70, 90".into());
        rule.labels = Some("red,orange,yellowgreen,green".into());
        rule.ramp = Some("#f00,#0f0".into());
        let mut input = input_args();
        input.domain = Some("0,100".into());

        let params = load_params(&input, Some(&rule)).unwrap();
        assert_eq!(params.domain, Domain::PERCENT);
        assert_eq!(params.ramp, vec!["#f00".to_string(), "#0f0".to_string()]);
        let built: ConfiguredRule = params.build_rule().unwrap();
        assert_eq!(built.classify(92.0), "green");
    }

    #[test]
    fn thresholds_without_labels_fail() {
        let mut rule = rule_args();
        rule.thresholds = Some("0.5".into());
        assert!(load_params(&input_args(), Some(&rule)).is_err());
    }

    #[test]
    fn bins_flag_switches_rule() {
        let mut rule = rule_args();
        rule.bins = Some(5);
        let params = load_params(&input_args(), Some(&rule)).unwrap();
        assert_eq!(params.rule, RuleSpec::EqualWidth { bins: 5 });
    }

    #[test]
    fn segment_rows_render_as_csv() {
        let rows = vec![SegmentRow {
            sensor: "Sensor A".into(),
            start: "2024-01-01T00:00:00".into(),
            end: "2024-01-02T00:00:00".into(),
            category: "Low".into(),
            aggregate: 0.425,
            sample_count: 2,
            color: "#d73027".into(),
        }];
        let mut buf = Vec::new();
        write_segment_rows(&rows, &mut buf).unwrap();
        let text = String::from_utf8(buf).unwrap();
        let mut lines = text.lines();
        assert_eq!(
            lines.next(),
            Some("sensor,start,end,category,aggregate,sample_count,color")
        );
        assert_eq!(
            lines.next(),
            Some("Sensor A,2024-01-01T00:00:00,2024-01-02T00:00:00,Low,0.425000,2,#d73027")
        );
    }

    #[test]
    fn read_records_accepts_aliases_and_default_sensor() {
        let dir = tempdir().unwrap();
        let path = csv_input(
            dir.path(),
            "coverage.csv",
            "Date,Coverage\n2024-01-02,0.4\n2024-01-01, 0.45\n2024-01-03,0.6\n",
        );
        let records = read_records(&path, "Sensor A").unwrap();
        assert_eq!(records.len(), 3);
        assert!(records.iter().all(|r| r.sensor == "Sensor A"));
        assert_eq!(records[0].timestamp, day(2));
        assert_eq!(records[1].timestamp, day(1));
        assert_eq!(records[1].value, 0.45);
        assert_eq!(records[2].timestamp, day(3));
    }

    #[test]
    fn empty_sensor_cells_fall_back_to_default() {
        let dir = tempdir().unwrap();
        let path = csv_input(
            dir.path(),
            "mixed.csv",
            "timestamp,value,sensor\n2024-01-01,0.5,Sensor B\n2024-01-02,0.6,\n",
        );
        let records = read_records(&path, "Sensor A").unwrap();
        let sensors: Vec<_> = records.iter().map(|r| r.sensor.as_str()).collect();
        assert_eq!(sensors, vec!["Sensor B", "Sensor A"]);

        let bad = csv_input(dir.path(), "bad.csv", "Date,Coverage\nsoon,0.5\n");
        assert!(read_records(&bad, "Sensor A").is_err());
    }

    #[test]
    fn rolling_command_writes_sensor_rows() {
        let dir = tempdir().unwrap();
        let mut input = input_args();
        input.input = csv_input(
            dir.path(),
            "coverage.csv",
            "Date,Coverage\n2024-01-01,0.4\n2024-01-02,0.45\n2024-01-03,0.6\n",
        );
        let output = dir.path().join("rolling.csv");
        handle_rolling(RollingArgs {
            input,
            window: Some(2),
            output: output.clone(),
        })
        .unwrap();

        let text = fs::read_to_string(&output).unwrap();
        let lines: Vec<_> = text.lines().collect();
        assert_eq!(
            lines,
            vec![
                "sensor,timestamp,value",
                "Sensor A,2024-01-02T00:00:00,0.425000",
                "Sensor A,2024-01-03T00:00:00,0.525000",
            ]
        );
    }

    #[test]
    fn summary_command_writes_legend() {
        let dir = tempdir().unwrap();
        let mut input = input_args();
        input.input = csv_input(
            dir.path(),
            "coverage.csv",
            "Date,Coverage\n2024-01-01,0.4\n2024-01-02,0.45\n",
        );
        let output = dir.path().join("summary.csv");
        handle_summary(SummaryArgs {
            input,
            rule: rule_args(),
            output: output.clone(),
        })
        .unwrap();

        let mut reader = csv::Reader::from_path(&output).unwrap();
        let headers = reader.headers().unwrap().clone();
        assert_eq!(
            headers.iter().collect::<Vec<_>>(),
            vec!["sensor", "samples", "segments", "mean", "legend"]
        );
        let rows: Vec<csv::StringRecord> = reader.records().map(|r| r.unwrap()).collect();
        assert_eq!(rows.len(), 1);
        assert_eq!(&rows[0][0], "Sensor A");
        assert_eq!(&rows[0][1], "2");
        assert_eq!(&rows[0][2], "1");
        assert_eq!(&rows[0][4], "Sensor A (42.5%)");
    }
}
