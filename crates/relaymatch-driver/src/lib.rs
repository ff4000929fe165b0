//! The experiment sweep driver. It loads the delay/price dataset from delimited text files,
//! repeats the matchmaking-and-allocation engine across server capacities, strategies, and
//! independent sessions, and writes aggregated mean/standard-deviation tables.
//!
//! Sessions are independent by construction (each gets its own seeded random source and its own
//! eligibility/assignment contexts), so the sweep runs them in parallel and merges only the
//! scalar outcome tuples.

use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use std::time::Instant;

use log::info;
use rand::rngs::StdRng;
use rand::SeedableRng;
use rayon::prelude::*;

use relaymatch_core::{
    match_basic, match_general, run_general, validate_assignment, Assignment, AssignmentError,
    DelayBounds, Eligibility, MatchError, Outcome, Strategy, Topology, TopologyError, TopologySpec,
};

/// An experiment configuration, typically loaded from a JSON file.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct Config {
    /// Directory containing `dc_to_pl_rtt.csv`, `dc_to_dc_rtt.csv`, and
    /// `dc_pricing_bandwidth_server.csv`.
    pub data_dir: PathBuf,
    /// Directory the aggregated result tables are written to.
    pub output_dir: PathBuf,
    /// Bound on client-to-host delay through the relay.
    pub delay_bound_to_host: f64,
    /// Bound on the client-to-relay leg.
    pub delay_bound_to_relay: f64,
    pub session_size: usize,
    pub session_count: usize,
    pub server_capacities: Vec<u32>,
    pub mode: Mode,
    /// Charge an amortized host-server cost when comparing candidate hosts (general mode only).
    #[serde(default)]
    pub include_host_server_cost: bool,
    /// Charged traffic volume applied to every client.
    #[serde(default = "default_traffic_volume")]
    pub traffic_volume: f64,
    /// When set to one of `server_capacities`, accumulate the per-datacenter open-server counts
    /// of the iterative strategies at that capacity across all sessions and write them as an
    /// extra table.
    #[serde(default)]
    pub server_count_capacity: Option<u32>,
    /// Base seed; session `i` draws from `seed + i`.
    #[serde(default)]
    pub seed: u64,
}

fn default_traffic_volume() -> f64 {
    1.0
}

impl Config {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, Error> {
        let contents = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&contents)?)
    }

    fn bounds(&self) -> DelayBounds {
        DelayBounds::new(self.delay_bound_to_host, self.delay_bound_to_relay)
    }
}

/// Which problem variant to sweep.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Fixed host per session, chosen by the basic matchmaker.
    Basic,
    /// Host search: every strategy picks the cheapest host among the eligible ones.
    General,
}

/// Driver error.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("IO error")]
    Io(#[from] std::io::Error),

    #[error("JSON error")]
    Json(#[from] serde_json::Error),

    #[error("{path}:{line}: expected at least {expected} columns")]
    MissingColumns {
        path: PathBuf,
        line: usize,
        expected: usize,
    },

    #[error("{path}:{line}: invalid number {value:?}")]
    InvalidNumber {
        path: PathBuf,
        line: usize,
        value: String,
        source: std::num::ParseFloatError,
    },

    #[error("invalid input data")]
    Topology(#[from] TopologyError),

    #[error("matchmaking failed")]
    Match(#[from] MatchError),

    #[error("assignment invariant violated")]
    Assignment(#[from] AssignmentError),
}

/// The strategies whose per-datacenter server counts are recorded when
/// [`Config::server_count_capacity`] is set. These are the ones whose placement the combined
/// price or the iterative rounds actually shape.
const SERVER_COUNT_STRATEGIES: [Strategy; 3] = [
    Strategy::LowestCombinedPrice,
    Strategy::LowestCapacityWastage,
    Strategy::LowestAverageCost,
];

/// The outcome 5-tuples and per-strategy computation times of one session, indexed by
/// `[capacity][strategy]` in `server_capacities` and [`Strategy::ALL`] order.
#[derive(Debug, Clone)]
pub struct SessionRecord {
    pub outcomes: Vec<Vec<Outcome>>,
    pub seconds: Vec<Vec<f64>>,
    /// Per-datacenter open-server counts at the instrumented capacity, one row per
    /// [`SERVER_COUNT_STRATEGIES`] entry. Empty when no capacity is instrumented.
    pub server_counts: Vec<Vec<f64>>,
}

/// Load the three dataset tables and build the topology. Measured RTTs are halved into one-way
/// delays here; the engine only ever sees one-way values.
pub fn load_topology(config: &Config) -> Result<Topology, Error> {
    let client_delays = parse_rtt_matrix(&config.data_dir.join("dc_to_pl_rtt.csv"))?;
    let dc_delays = parse_rtt_matrix(&config.data_dir.join("dc_to_dc_rtt.csv"))?;
    let (price_bandwidth, price_server) =
        parse_pricing(&config.data_dir.join("dc_pricing_bandwidth_server.csv"))?;
    let nr_clients = client_delays.len();
    let topology = TopologySpec::builder()
        .client_to_dc_delays(client_delays)
        .dc_to_dc_delays(dc_delays)
        .price_server(price_server)
        .price_bandwidth(price_bandwidth)
        .traffic_volumes(vec![config.traffic_volume; nr_clients])
        .build()
        .validate()?;
    info!(
        "loaded {} clients and {} datacenters from {}",
        topology.nr_clients(),
        topology.nr_datacenters(),
        config.data_dir.display()
    );
    Ok(topology)
}

/// Run the full sweep and write the aggregated result tables.
pub fn run(config: &Config) -> Result<(), Error> {
    let topology = load_topology(config)?;
    let records = run_sweep(config, &topology)?;
    write_outputs(config, &records)?;
    Ok(())
}

/// Run `session_count` independent sessions, each sweeping every capacity and strategy.
pub fn run_sweep(config: &Config, topology: &Topology) -> Result<Vec<SessionRecord>, Error> {
    let records = (0..config.session_count)
        .into_par_iter()
        .map(|session| run_session(config, topology, session))
        .collect::<Result<Vec<_>, _>>()?;
    info!(
        "completed {} sessions of size {} (bounds {}/{})",
        config.session_count,
        config.session_size,
        config.delay_bound_to_host,
        config.delay_bound_to_relay
    );
    Ok(records)
}

fn run_session(config: &Config, topology: &Topology, session: usize) -> Result<SessionRecord, Error> {
    let mut rng = StdRng::seed_from_u64(config.seed.wrapping_add(session as u64));
    let bounds = config.bounds();
    let mut outcomes = Vec::with_capacity(config.server_capacities.len());
    let mut seconds = Vec::with_capacity(config.server_capacities.len());
    let mut server_counts = Vec::new();
    let mut record_servers = |strategy: Strategy, capacity: u32, assignment: &Assignment| {
        if config.server_count_capacity == Some(capacity)
            && SERVER_COUNT_STRATEGIES.contains(&strategy)
        {
            server_counts.push(servers_per_dc(topology, assignment, capacity));
        }
    };
    match config.mode {
        Mode::Basic => {
            let matched = match_basic(topology, config.session_size, bounds, &mut rng)?;
            for &capacity in &config.server_capacities {
                let mut row = Vec::with_capacity(Strategy::ALL.len());
                let mut times = Vec::with_capacity(Strategy::ALL.len());
                for strategy in Strategy::ALL {
                    let start = Instant::now();
                    let (assignment, outcome) = strategy.run_basic(
                        topology,
                        matched.host,
                        &matched.clients,
                        &matched.eligibility,
                        capacity,
                        &mut rng,
                    );
                    times.push(start.elapsed().as_secs_f64());
                    validate_assignment(&matched.clients, &matched.eligibility, &assignment)?;
                    record_servers(strategy, capacity, &assignment);
                    row.push(outcome);
                }
                outcomes.push(row);
                seconds.push(times);
            }
        }
        Mode::General => {
            let matched = match_general(topology, config.session_size, bounds, &mut rng)?;
            for &capacity in &config.server_capacities {
                let mut row = Vec::with_capacity(Strategy::ALL.len());
                let mut times = Vec::with_capacity(Strategy::ALL.len());
                for strategy in Strategy::ALL {
                    let start = Instant::now();
                    let result = run_general(
                        strategy,
                        topology,
                        &matched.clients,
                        &matched.eligible_hosts,
                        bounds,
                        capacity,
                        config.include_host_server_cost,
                        &mut rng,
                    );
                    times.push(start.elapsed().as_secs_f64());
                    let eligibility = Eligibility::compute(
                        topology,
                        result.host,
                        matched.clients.iter().copied(),
                        bounds,
                    );
                    validate_assignment(&matched.clients, &eligibility, &result.assignment)?;
                    record_servers(strategy, capacity, &result.assignment);
                    row.push(result.outcome);
                }
                outcomes.push(row);
                seconds.push(times);
            }
        }
    }
    Ok(SessionRecord {
        outcomes,
        seconds,
        server_counts,
    })
}

/// Open-server counts per datacenter for one assignment, in datacenter-id order.
fn servers_per_dc(topology: &Topology, assignment: &Assignment, capacity: u32) -> Vec<f64> {
    topology
        .dc_ids()
        .map(|dc| (assignment.clients_of(dc).len() as f64 / f64::from(capacity)).ceil())
        .collect()
}

/// Write mean and standard-deviation tables (rows = capacities, columns = strategies) for the
/// normalized total cost, capacity wastage, average delay, and per-strategy computation time.
fn write_outputs(config: &Config, records: &[SessionRecord]) -> Result<(), Error> {
    std::fs::create_dir_all(&config.output_dir)?;
    let settings = format!(
        "{}_{}_{}",
        config.delay_bound_to_host, config.delay_bound_to_relay, config.session_size
    );
    // Total cost is normalized per session by the lower-bound strategy's cost.
    write_metric(config, &settings, "costTotal", records, |record, cap, strat| {
        record.outcomes[cap][strat].total_cost / record.outcomes[cap][0].total_cost
    })?;
    write_metric(
        config,
        &settings,
        "capacityWastage",
        records,
        |record, cap, strat| record.outcomes[cap][strat].capacity_wastage,
    )?;
    write_metric(
        config,
        &settings,
        "averageDelay",
        records,
        |record, cap, strat| record.outcomes[cap][strat].avg_delay,
    )?;
    write_metric(
        config,
        &settings,
        "computation",
        records,
        |record, cap, strat| record.seconds[cap][strat],
    )?;
    write_server_counts(config, &settings, records)?;
    Ok(())
}

/// Write the per-datacenter open-server counts at the instrumented capacity, summed across
/// sessions: one row per instrumented strategy, one column per datacenter.
fn write_server_counts(
    config: &Config,
    settings: &str,
    records: &[SessionRecord],
) -> Result<(), Error> {
    if records.iter().all(|r| r.server_counts.is_empty()) {
        return Ok(());
    }
    let nr_dcs = records
        .iter()
        .flat_map(|r| &r.server_counts)
        .map(Vec::len)
        .next()
        .unwrap_or(0);
    let mut table = String::new();
    for (i, strategy) in SERVER_COUNT_STRATEGIES.into_iter().enumerate() {
        let mut totals = vec![0.0; nr_dcs];
        for record in records {
            if let Some(counts) = record.server_counts.get(i) {
                for (total, count) in totals.iter_mut().zip(counts) {
                    *total += count;
                }
            }
        }
        let row = totals.iter().map(f64::to_string).collect::<Vec<_>>();
        writeln!(table, "{},{}", strategy.short_name(), row.join(","))
            .expect("writing to a string cannot fail");
    }
    let path = config
        .output_dir
        .join(format!("{settings}_serverCountPerDC.csv"));
    std::fs::write(path, table)?;
    Ok(())
}

fn write_metric(
    config: &Config,
    settings: &str,
    metric: &str,
    records: &[SessionRecord],
    value: impl Fn(&SessionRecord, usize, usize) -> f64,
) -> Result<(), Error> {
    let nr_caps = config.server_capacities.len();
    let nr_strats = Strategy::ALL.len();
    let mut means = String::new();
    let mut stds = String::new();
    let header = Strategy::ALL.map(Strategy::short_name).join(",");
    for table in [&mut means, &mut stds] {
        writeln!(table, "{header}").expect("writing to a string cannot fail");
    }
    for cap in 0..nr_caps {
        let mut mean_row = Vec::with_capacity(nr_strats);
        let mut std_row = Vec::with_capacity(nr_strats);
        for strat in 0..nr_strats {
            let samples = records
                .iter()
                .map(|record| value(record, cap, strat))
                .collect::<Vec<_>>();
            mean_row.push(format!("{}", mean(&samples)));
            std_row.push(format!("{}", std_dev(&samples)));
        }
        writeln!(means, "{}", mean_row.join(",")).expect("writing to a string cannot fail");
        writeln!(stds, "{}", std_row.join(",")).expect("writing to a string cannot fail");
    }
    let mean_path = config
        .output_dir
        .join(format!("{settings}_{metric}Mean.csv"));
    let std_path = config.output_dir.join(format!("{settings}_{metric}Std.csv"));
    std::fs::write(mean_path, means)?;
    std::fs::write(std_path, stds)?;
    Ok(())
}

fn mean(xs: &[f64]) -> f64 {
    xs.iter().sum::<f64>() / xs.len() as f64
}

/// Population standard deviation.
fn std_dev(xs: &[f64]) -> f64 {
    let m = mean(xs);
    (xs.iter().map(|x| (x - m).powi(2)).sum::<f64>() / xs.len() as f64).sqrt()
}

/// Parse a delimited RTT table (header line, leading label column) into one-way delays.
fn parse_rtt_matrix(path: &Path) -> Result<Vec<Vec<f64>>, Error> {
    let contents = std::fs::read_to_string(path)?;
    let mut rows = Vec::new();
    // Physical 1-based line numbers in errors; index 0 is the header.
    for (idx, line) in contents.lines().enumerate().skip(1) {
        let line_no = idx + 1;
        if line.trim().is_empty() {
            continue;
        }
        let mut fields = line.split(',');
        fields.next(); // row label
        let row = fields
            .map(|field| parse_number(field, path, line_no))
            .collect::<Result<Vec<_>, _>>()?;
        if row.is_empty() {
            return Err(Error::MissingColumns {
                path: path.into(),
                line: line_no,
                expected: 2,
            });
        }
        rows.push(row.into_iter().map(|rtt| rtt / 2.0).collect());
    }
    Ok(rows)
}

/// Parse the per-datacenter pricing table: `label,bandwidth,server,...`. Returns
/// `(price_bandwidth, price_server)`.
fn parse_pricing(path: &Path) -> Result<(Vec<f64>, Vec<f64>), Error> {
    let contents = std::fs::read_to_string(path)?;
    let mut bandwidth = Vec::new();
    let mut server = Vec::new();
    for (idx, line) in contents.lines().enumerate().skip(1) {
        let line_no = idx + 1;
        if line.trim().is_empty() {
            continue;
        }
        let fields = line.split(',').collect::<Vec<_>>();
        if fields.len() < 3 {
            return Err(Error::MissingColumns {
                path: path.into(),
                line: line_no,
                expected: 3,
            });
        }
        bandwidth.push(parse_number(fields[1], path, line_no)?);
        server.push(parse_number(fields[2], path, line_no)?);
    }
    Ok((bandwidth, server))
}

fn parse_number(field: &str, path: &Path, line: usize) -> Result<f64, Error> {
    field
        .trim()
        .parse::<f64>()
        .map_err(|source| Error::InvalidNumber {
            path: path.into(),
            line,
            value: field.to_string(),
            source,
        })
}
