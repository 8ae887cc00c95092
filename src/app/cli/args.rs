//! Command line arguments

use crate::core::validation::split_pair;
use clap::{ArgAction, Parser};
use std::io::IsTerminal;
use std::path::PathBuf;

#[derive(Parser, Debug, Clone, Default)]
#[command(name = "brokerlink")]
#[command(about = "Produce to and consume from broker topics")]
#[command(version)]
#[command(after_help = " * can be specified multiple times")]
pub struct Args {
    /// Configuration file path
    #[arg(short = 'c', long = "config-file", value_name = "FILE")]
    pub config_file: Option<PathBuf>,

    /// Broker URL (overrides the configuration file)
    #[arg(short = 'u', long = "url", value_name = "URL")]
    pub url: Option<String>,

    /// Force colored log output
    #[arg(short = 'g', long = "color", conflicts_with = "no_color")]
    pub color: bool,

    /// Disable colored log output
    #[arg(long = "no-color", conflicts_with = "color")]
    pub no_color: bool,

    /// Log level
    #[arg(short = 'l', long = "log-level", value_name = "LEVEL", value_parser = ["trace", "debug", "info", "warn", "error", "off"])]
    pub log_level: Option<String>,

    /// Log file path
    #[arg(short = 'f', long = "log-file", value_name = "FILE")]
    pub log_file: Option<PathBuf>,

    /// Log output format
    #[arg(short = 'o', long = "log-format", value_name = "FORMAT", value_parser = ["text", "ext", "json"])]
    pub log_format: Option<String>,

    /// Consume a topic with a group, logging each message*
    #[arg(short = 'C', long = "consume", value_name = "TOPIC:GROUP", action = ArgAction::Append)]
    pub consume: Vec<String>,

    /// Send one message to a topic at startup*
    #[arg(short = 'P', long = "produce", value_name = "TOPIC=PAYLOAD", action = ArgAction::Append)]
    pub produce: Vec<String>,
}

impl Args {
    /// Whether log output should be colored
    ///
    /// `--no-color` always wins; otherwise color is used when forced or
    /// when stdout is a terminal.
    pub fn use_color(&self) -> bool {
        (self.color || std::io::stdout().is_terminal()) && !self.no_color
    }

    /// `--consume` values as (topic, group) pairs
    pub fn consumer_specs(&self) -> Result<Vec<(String, String)>, String> {
        self.consume
            .iter()
            .map(|spec| {
                split_pair(spec, ':', "consumer").map(|(t, g)| (t.to_string(), g.to_string()))
            })
            .collect()
    }

    /// `--produce` values as (topic, payload) pairs
    pub fn produce_specs(&self) -> Result<Vec<(String, String)>, String> {
        self.produce
            .iter()
            .map(|spec| {
                split_pair(spec, '=', "message").map(|(t, p)| (t.to_string(), p.to_string()))
            })
            .collect()
    }
}
