use crate::error::{PfResult, PoolError};
use crate::init::InitStrategy;
use clap::{parser::ValueSource, ArgAction, ArgMatches, Args};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

#[derive(Args, Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[command(flatten)]
    #[serde(default)]
    pub design: DesignParams,
    #[command(flatten)]
    #[serde(default)]
    pub search: SearchParams,
}

#[derive(Args, Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DesignParams {
    #[arg(long, default_value_t = 100)]
    pub num_peptides: usize,
    #[arg(long, default_value_t = 5)]
    pub peptides_per_pool: usize,
    #[arg(long, default_value_t = 3)]
    pub num_replicates: usize,
    #[arg(long, default_value_t = InitStrategy::Greedy)]
    pub strategy: InitStrategy,
}

impl Default for DesignParams {
    fn default() -> Self {
        Self {
            num_peptides: 100,
            peptides_per_pool: 5,
            num_replicates: 3,
            strategy: InitStrategy::Greedy,
        }
    }
}

#[derive(Args, Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchParams {
    #[arg(long, default_value_t = 2000)]
    pub max_iters: usize,

    // Inject an empty pool into every replicate that keeps stalling
    #[arg(long = "no-add-pool-if-stuck", action = ArgAction::SetFalse)]
    pub add_pool_if_stuck: bool,

    // Non-improving iterations before pools are injected
    #[arg(long, default_value_t = 3)]
    pub stall_limit: usize,

    // Violations per extra pool when the start is far from valid
    #[arg(long, default_value_t = 1000)]
    pub violation_pool_threshold: usize,

    #[arg(long, default_value_t = false)]
    pub verbose: bool,

    #[arg(long = "no-history", action = ArgAction::SetFalse)]
    pub return_history: bool,
}

impl Default for SearchParams {
    fn default() -> Self {
        Self {
            max_iters: 2000,
            add_pool_if_stuck: true,
            stall_limit: 3,
            violation_pool_threshold: 1000,
            verbose: false,
            return_history: true,
        }
    }
}

impl Config {
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> PfResult<Self> {
        let content = fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&content)?;
        Ok(config)
    }

    /// Overlays only the arguments the user actually typed, so a config file
    /// is not clobbered by clap defaults.
    pub fn merge_from_cli(&mut self, cli: &Config, matches: &ArgMatches) {
        macro_rules! update_if_present {
            ($group:ident . $field:ident) => {
                if matches.value_source(stringify!($field)) == Some(ValueSource::CommandLine) {
                    self.$group.$field = cli.$group.$field.clone();
                }
            };
        }

        update_if_present!(design.num_peptides);
        update_if_present!(design.peptides_per_pool);
        update_if_present!(design.num_replicates);
        update_if_present!(design.strategy);

        update_if_present!(search.max_iters);
        update_if_present!(search.add_pool_if_stuck);
        update_if_present!(search.stall_limit);
        update_if_present!(search.violation_pool_threshold);
        update_if_present!(search.verbose);
        update_if_present!(search.return_history);
    }

    pub fn validate(&self) -> PfResult<()> {
        if self.design.num_peptides == 0 {
            return Err(PoolError::Config("num_peptides must be at least 1".into()));
        }
        if self.design.peptides_per_pool == 0 {
            return Err(PoolError::Config(
                "peptides_per_pool must be at least 1".into(),
            ));
        }
        if self.design.num_replicates == 0 {
            return Err(PoolError::Config("num_replicates must be at least 1".into()));
        }
        if self.search.stall_limit == 0 {
            return Err(PoolError::Config("stall_limit must be at least 1".into()));
        }
        if self.search.violation_pool_threshold == 0 {
            return Err(PoolError::Config(
                "violation_pool_threshold must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::{CommandFactory, FromArgMatches, Parser};
    use std::io::Write;

    #[derive(Parser, Debug)]
    struct Harness {
        #[command(flatten)]
        config: Config,
    }

    fn parse(args: &[&str]) -> (Config, ArgMatches) {
        let matches = Harness::command()
            .try_get_matches_from(std::iter::once("poolforge").chain(args.iter().copied()))
            .unwrap();
        let harness = Harness::from_arg_matches(&matches).unwrap();
        (harness.config, matches)
    }

    #[test]
    fn test_cli_defaults_match_struct_defaults() {
        let (cli, _) = parse(&[]);
        let default = Config::default();
        assert_eq!(cli.search.max_iters, default.search.max_iters);
        assert_eq!(cli.search.add_pool_if_stuck, default.search.add_pool_if_stuck);
        assert_eq!(cli.search.return_history, default.search.return_history);
        assert_eq!(cli.design.strategy, default.design.strategy);
    }

    #[test]
    fn test_negative_flags() {
        let (cli, _) = parse(&["--no-add-pool-if-stuck", "--no-history"]);
        assert!(!cli.search.add_pool_if_stuck);
        assert!(!cli.search.return_history);
    }

    #[test]
    fn test_file_values_survive_cli_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"{{ "design": {{ "num_peptides": 40, "strategy": "random" }}, "search": {{ "max_iters": 50 }} }}"#
        )
        .unwrap();

        let mut config = Config::load_from_file(file.path()).unwrap();
        assert_eq!(config.design.peptides_per_pool, 5);

        let (cli, matches) = parse(&["--max-iters", "75", "--peptides-per-pool", "4"]);
        config.merge_from_cli(&cli, &matches);

        assert_eq!(config.design.num_peptides, 40);
        assert_eq!(config.design.strategy, InitStrategy::Random);
        assert_eq!(config.design.peptides_per_pool, 4);
        assert_eq!(config.search.max_iters, 75);
    }

    #[test]
    fn test_validate_rejects_zero_sizes() {
        let mut config = Config::default();
        assert!(config.validate().is_ok());
        config.design.peptides_per_pool = 0;
        assert!(config.validate().is_err());
    }
}
