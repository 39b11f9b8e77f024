//! Terminal output for the subcommands.

use colored::Colorize;
use ds_core::config::models::AppConfig;
use ds_protocol::{CleanReport, DependencyState, StackStatus, StartReport, StopOutcome};

pub fn print_started(report: &StartReport, config: &AppConfig) {
    println!("{} Stack is running", "✓".green().bold());
    println!("  {:<14}{}", "database", report.dependency_address);
    if let Some(endpoint) = &report.control_plane_endpoint {
        println!("  {:<14}{}", config.stack.control_plane.name, endpoint);
    }
    println!("  {:<14}{}", "logs", config.logs_dir().display());

    if report.launched.is_empty() {
        println!("{}", "Everything was already running.".dimmed());
    } else {
        println!("Launched: {}", report.launched.join(", ").cyan());
    }
}

pub fn print_stopped(outcomes: &[(String, StopOutcome)]) {
    for (name, outcome) in outcomes {
        let label = match outcome {
            StopOutcome::Stopped => "stopped".green(),
            StopOutcome::NotRunning => "not running".dimmed(),
            StopOutcome::Stale => "already gone, record removed".yellow(),
            StopOutcome::TimedOut => "did not stop in time, left running".red(),
        };
        println!("  {name:<18}{label}");
    }
}

pub fn print_cleaned(report: &CleanReport, config: &AppConfig) {
    let container = &config.stack.database.container;
    if report.container_removed {
        println!("{} Removed container {container} and its data", "✓".green().bold());
    } else {
        println!(
            "{} Could not remove container {container}, see the log above",
            "!".yellow().bold()
        );
    }
}

pub fn print_status(status: &StackStatus, config: &AppConfig) {
    let state = match status.dependency {
        DependencyState::Ready => "ready".green(),
        DependencyState::Starting => "starting".yellow(),
        DependencyState::Stopped => "stopped".yellow(),
        DependencyState::Absent => "absent".dimmed(),
    };
    println!(
        "{} {}: {}",
        "database".bold(),
        config.stack.database.container,
        state
    );

    if status.services.is_empty() {
        println!("{}", "No services recorded.".dimmed());
        return;
    }
    for service in &status.services {
        let liveness = if service.alive {
            "running".green()
        } else {
            "dead".red()
        };
        let handle = service.handle.to_string();
        let since = service.handle.started_at.format("%Y-%m-%d %H:%M:%S UTC");
        println!("  {handle:<40}{liveness:<10}{}", format!("since {since}").dimmed());
    }
}
