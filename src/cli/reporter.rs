// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Tetralink Team

//! CLI output reporter with colored formatting

use colored::*;
use std::path::Path;
use std::time::Duration;

use crate::mesh::MeshStats;
use crate::strategy::StrategyKind;

/// CLI reporter for formatted output
pub struct Reporter;

impl Reporter {
    /// Report a finished computation
    pub fn report_mesh(
        output: &Path,
        stats: &MeshStats,
        kind: StrategyKind,
        duration: Duration,
        groups: usize,
    ) {
        println!("\n{}", "━".repeat(80).bright_black());
        println!(
            "{} {}",
            "Meshed:".bold(),
            output.display().to_string().cyan()
        );
        println!("{}", "━".repeat(80).bright_black());
        Self::report_stats(stats);
        if groups > 0 {
            println!(
                "  {} {}",
                "Groups:".bright_black(),
                groups.to_string().cyan()
            );
        }
        let engine = match kind {
            StrategyKind::Library => "in process",
            StrategyKind::Executable => "executable",
        };
        println!(
            "  {} {} ({})",
            "Time:".bright_black(),
            Self::format_duration(duration).yellow(),
            engine
        );
        println!("{}", "━".repeat(80).bright_black());
    }

    /// Entity counts and volume of a mesh
    pub fn report_stats(stats: &MeshStats) {
        let rows = [
            ("Nodes", stats.nodes),
            ("Required vertices", stats.required_vertices),
            ("Edges", stats.edges),
            ("Triangles", stats.triangles),
            ("Quadrilaterals", stats.quadrilaterals),
            ("Tetrahedra", stats.tetrahedra),
            ("Hexahedra", stats.hexahedra),
            ("Sub-domains", stats.subdomains),
        ];
        for (name, count) in rows {
            if count > 0 || name == "Nodes" {
                println!(
                    "  {} {}",
                    format!("{}:", name).bright_black(),
                    count.to_string().cyan()
                );
            }
        }
        if stats.tetrahedra > 0 {
            println!(
                "  {} {}",
                "Volume:".bright_black(),
                format!("{:.6}", stats.volume).cyan()
            );
        }
    }

    /// Report error
    pub fn report_error(message: &str) {
        eprintln!("\n{} {}", "❌ Error:".red().bold(), message);
    }

    /// Report warning
    pub fn report_warning(message: &str) {
        println!("\n{} {}", "⚠️  Warning:".yellow().bold(), message);
    }

    /// Report info
    pub fn report_info(message: &str) {
        println!("{} {}", "ℹ️".bright_blue(), message);
    }

    /// Format duration for display
    pub fn format_duration(duration: Duration) -> String {
        let micros = duration.as_micros();

        if micros < 1_000 {
            format!("{}µs", micros)
        } else if micros < 1_000_000 {
            format!("{:.2}ms", micros as f64 / 1_000.0)
        } else {
            format!("{:.2}s", micros as f64 / 1_000_000.0)
        }
    }

    /// Print success message
    pub fn success(message: &str) {
        println!("{} {}", "✅".green(), message.green());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_duration() {
        assert_eq!(
            Reporter::format_duration(Duration::from_micros(500)),
            "500µs"
        );
        assert_eq!(
            Reporter::format_duration(Duration::from_millis(5)),
            "5.00ms"
        );
        assert_eq!(Reporter::format_duration(Duration::from_secs(2)), "2.00s");
    }
}
