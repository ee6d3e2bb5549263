//! Command-line interface for training and serving.

use clap::{Parser, Subcommand};
use colored::*;
use std::path::PathBuf;
use std::time::Instant;

use crate::training::train_model;

// ─── Styling helpers ───────────────────────────────────────────────────────────

const W: usize = 58; // box inner width

fn dim(s: &str) -> ColoredString {
    s.truecolor(100, 100, 100)
}
fn accent(s: &str) -> ColoredString {
    s.truecolor(120, 170, 255)
}
fn muted(s: &str) -> ColoredString {
    s.truecolor(140, 140, 140)
}
fn ok(s: &str) -> ColoredString {
    s.truecolor(100, 210, 120)
}

fn line_box_top() {
    println!("  {}", dim("┌─────────────────────────────────────────────────────────┐"));
}
fn line_box_bottom() {
    println!("  {}", dim("└─────────────────────────────────────────────────────────┘"));
}
fn line_box_sep() {
    println!("  {}", dim("├─────────────────────────────────────────────────────────┤"));
}

fn line_box(content: &str) {
    let visible_len = strip_ansi(content).len();
    let pad = if visible_len < W { W - visible_len } else { 0 };
    println!("  {}  {}{} {}", dim("│"), content, " ".repeat(pad), dim("│"));
}

fn line_box_center(content: &str) {
    let visible_len = strip_ansi(content).len();
    let total_pad = if visible_len < W { W - visible_len } else { 0 };
    let left = total_pad / 2;
    let right = total_pad - left;
    println!("  {}  {}{}{} {}", dim("│"), " ".repeat(left), content, " ".repeat(right), dim("│"));
}

fn line_box_empty() {
    line_box("");
}

fn strip_ansi(s: &str) -> String {
    let mut out = String::new();
    let mut in_escape = false;
    for c in s.chars() {
        if c == '\x1b' {
            in_escape = true;
            continue;
        }
        if in_escape {
            if c == 'm' {
                in_escape = false;
            }
            continue;
        }
        out.push(c);
    }
    out
}

fn kv(key: &str, val: &str) -> String {
    format!("{} {}", muted(key), val.white())
}

fn step_run(msg: &str) {
    print!("  {} {}... ", accent("›"), msg);
}

fn step_done(detail: &str) {
    println!("{} {}", ok("done"), dim(detail));
}

fn section(title: &str) {
    println!();
    println!("  {}", title.white().bold());
    println!("  {}", dim(&"─".repeat(56)));
}

// ─── CLI definition ────────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "churn-api")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Churn analysis API: schema-aware training and prediction")]
#[command(long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Train a churn model from a CSV file
    Train {
        /// Training data CSV
        #[arg(short, long)]
        data: PathBuf,

        /// Target column name (auto-detected when omitted)
        #[arg(short, long)]
        target: Option<String>,

        /// Output model file
        #[arg(short, long, default_value = "model/model.json")]
        output: PathBuf,
    },

    /// Start the web server
    Serve {
        /// Server port
        #[arg(short, long, default_value = "8000")]
        port: u16,

        /// Server host
        #[arg(long, default_value = "0.0.0.0")]
        host: String,
    },
}

// ─── Commands ──────────────────────────────────────────────────────────────────

pub fn cmd_train(
    data_path: &PathBuf,
    target: Option<&str>,
    output: &PathBuf,
) -> anyhow::Result<()> {
    section("Train");

    step_run("Training");
    let start = Instant::now();
    let outcome = train_model(data_path, target, output)?;
    step_done(&format!("{:?}", start.elapsed()));

    let schema = &outcome.artifact.schema;
    let metrics = &outcome.metrics;

    println!();
    println!("  {:<16} {}", muted("Target"), schema.target_column.white().bold());
    println!("  {:<16} {}", muted("Features"), format!("{}", schema.feature_columns.len()).white());
    println!("  {:<16} {}", muted("Accuracy"), format!("{:.4}", metrics.accuracy).white().bold());
    println!("  {:<16} {}", muted("ROC AUC"), format!("{:.4}", metrics.roc_auc).white());
    println!("  {:<16} {}", muted("F1"), format!("{:.4}", metrics.f1_score).white());
    println!("  {:<16} {}", muted("Model"), output.display().to_string().white());
    println!();

    Ok(())
}

// ─── Serve ─────────────────────────────────────────────────────────────────────

pub async fn cmd_serve(host: &str, port: u16) -> anyhow::Result<()> {
    use crate::server::{run_server, ServerConfig};

    println!();
    line_box_top();
    line_box_empty();
    line_box_center(&format!("{}", "Churn Analysis API".white().bold()));
    line_box_center(&format!("{}", dim(&format!("v{}", env!("CARGO_PKG_VERSION")))));
    line_box_empty();
    line_box_sep();
    line_box_empty();
    line_box(&kv("API    ", &format!("http://{}:{}", host, port)));
    line_box(&kv("Health ", &format!("http://{}:{}/health", host, port)));
    line_box(&kv("Schema ", &format!("http://{}:{}/schema", host, port)));
    line_box_empty();
    line_box_sep();
    line_box_empty();
    line_box_center(&format!("{}", dim("ctrl+c to stop")));
    line_box_empty();
    line_box_bottom();
    println!();

    let config = ServerConfig {
        host: host.to_string(),
        port,
        ..Default::default()
    };

    run_server(config).await
}
