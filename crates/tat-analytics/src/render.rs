//! Plain-text table rendering for the terminal.
//!
//! Each view builds a [`TextTable`]: a header row, one row per item, and an
//! optional highlighted footer. Columns are sized by display width so test
//! names outside ASCII still line up.

use std::fmt::Write as _;

use unicode_width::UnicodeWidthStr;

use tat_core::formatting::format_count;
use tat_core::models::Stage;
use tat_data::aggregator::Window;
use tat_data::analysis::AnalysisMetadata;
use tat_data::efficiency::TatxBreakdown;
use tat_data::statistics::{PeriodStatistics, RecordBreakdown, StatCell, TrendSeries};

/// A bordered text table. The first column is left-aligned, the rest are
/// right-aligned.
#[derive(Debug, Clone, Default)]
pub struct TextTable {
    title: String,
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
    footer: Option<Vec<String>>,
}

impl TextTable {
    pub fn new(title: impl Into<String>, headers: &[&str]) -> Self {
        Self {
            title: title.into(),
            headers: headers.iter().map(|h| h.to_string()).collect(),
            ..Default::default()
        }
    }

    pub fn row(&mut self, cells: Vec<String>) {
        self.rows.push(cells);
    }

    pub fn footer(&mut self, cells: Vec<String>) {
        self.footer = Some(cells);
    }

    fn widths(&self) -> Vec<usize> {
        let mut widths: Vec<usize> = self.headers.iter().map(|h| h.width()).collect();
        for row in self.rows.iter().chain(self.footer.iter()) {
            for (i, cell) in row.iter().enumerate() {
                if let Some(w) = widths.get_mut(i) {
                    *w = (*w).max(cell.width());
                }
            }
        }
        widths
    }

    fn line(cells: &[String], widths: &[usize]) -> String {
        let mut out = String::from("│");
        for (i, width) in widths.iter().enumerate() {
            let cell = cells.get(i).map(String::as_str).unwrap_or("");
            let pad = " ".repeat(width.saturating_sub(cell.width()));
            if i == 0 {
                let _ = write!(out, " {}{} │", cell, pad);
            } else {
                let _ = write!(out, " {}{} │", pad, cell);
            }
        }
        out
    }

    fn rule(widths: &[usize], left: &str, mid: &str, right: &str) -> String {
        let segments: Vec<String> = widths.iter().map(|w| "─".repeat(w + 2)).collect();
        format!("{}{}{}", left, segments.join(mid), right)
    }

    pub fn render(&self) -> String {
        let widths = self.widths();
        let mut out = String::new();

        if !self.title.is_empty() {
            let _ = writeln!(out, "{}", self.title);
        }
        let _ = writeln!(out, "{}", Self::rule(&widths, "┌", "┬", "┐"));
        let _ = writeln!(out, "{}", Self::line(&self.headers, &widths));
        let _ = writeln!(out, "{}", Self::rule(&widths, "├", "┼", "┤"));
        for row in &self.rows {
            let _ = writeln!(out, "{}", Self::line(row, &widths));
        }
        if let Some(footer) = &self.footer {
            let _ = writeln!(out, "{}", Self::rule(&widths, "├", "┼", "┤"));
            let _ = writeln!(out, "{}", Self::line(footer, &widths));
        }
        let _ = writeln!(out, "{}", Self::rule(&widths, "└", "┴", "┘"));
        out
    }
}

// ── Views ─────────────────────────────────────────────────────────────────────

/// One-line description of the run.
pub fn metadata_line(meta: &AnalysisMetadata) -> String {
    let range = meta
        .range
        .map(|r| format!("{} to {}", r.start.to_rfc3339(), r.end.to_rfc3339()))
        .unwrap_or_else(|| format!("around {}", meta.now));
    let loaded = if meta.records_in_range == meta.records_loaded {
        format_count(meta.records_loaded as u64)
    } else {
        format!(
            "{} of {}",
            format_count(meta.records_in_range as u64),
            format_count(meta.records_loaded as u64)
        )
    };
    format!(
        "{} records ({} valid) from {} files, {} [{}]",
        loaded,
        format_count(meta.valid_samples as u64),
        meta.files_read,
        range,
        meta.timezone
    )
}

fn stat_text(cell: &StatCell) -> String {
    if cell.count == 0 {
        cell.current.clone()
    } else {
        format!("{} ({})", cell.current, cell.count)
    }
}

pub fn summary_table(stats: &PeriodStatistics) -> TextTable {
    let mut table = TextTable::new("Average turnaround by stage", &["Stage", "Daily", "Weekly", "Monthly"]);
    for stage in Stage::ALL {
        let mut row = vec![stage.to_string()];
        row.extend(Window::ALL.iter().map(|w| stat_text(stats.window(*w).get(stage))));
        table.row(row);
    }
    let mut footer = vec!["Total".to_string()];
    footer.extend(Window::ALL.iter().map(|w| stat_text(&stats.window(*w).total)));
    table.footer(footer);
    table
}

pub fn trend_table(series: &TrendSeries) -> TextTable {
    let title = format!("Turnaround trend ({:?} buckets, minutes)", series.granularity);
    let mut headers = vec!["Period"];
    headers.extend(Stage::ALL.iter().map(|s| s.as_str()));
    headers.extend(["total", "count"]);
    let mut table = TextTable::new(title, &headers);

    for point in &series.points {
        let mut row = vec![point.label.clone()];
        row.extend(Stage::ALL.iter().map(|s| point.get(*s).to_string()));
        row.push(point.total.to_string());
        row.push(format_count(u64::from(point.count)));
        table.row(row);
    }
    table
}

pub fn tatx_table(breakdown: &TatxBreakdown) -> TextTable {
    let title = match &breakdown.test_name {
        Some(test) => format!("TATx by priority ({})", test),
        None => "TATx by priority".to_string(),
    };
    let mut table = TextTable::new(title, &["Priority", "Target", "Actual", "Count", "TATx"]);
    for class in &breakdown.classes {
        table.row(vec![
            class.priority.to_string(),
            format!("{}m", class.target_minutes.round()),
            class.actual.clone(),
            format_count(u64::from(class.count)),
            class.score.to_string(),
        ]);
    }
    table.footer(vec![
        "Overall".to_string(),
        String::new(),
        String::new(),
        format_count(u64::from(breakdown.count)),
        breakdown.overall.to_string(),
    ]);
    table
}

pub fn records_table(records: &[RecordBreakdown]) -> TextTable {
    let mut headers = vec!["Id", "Priority", "Test"];
    headers.extend(Stage::ALL.iter().map(|s| s.as_str()));
    headers.push("total");
    let mut table = TextTable::new("Per-record turnaround", &headers);

    for record in records {
        let id = if record.id.is_empty() { "-" } else { record.id.as_str() };
        table.row(vec![
            id.to_string(),
            record.priority.to_string(),
            record.test_name.clone().unwrap_or_default(),
            record.dispatch.clone(),
            record.collection.clone(),
            record.registration.clone(),
            record.processing.clone(),
            record.delivery.clone(),
            record.total.clone(),
        ]);
    }
    table
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_columns_align_by_display_width() {
        let mut table = TextTable::new("", &["Test", "Count"]);
        table.row(vec!["Hämoglobin".to_string(), "3".to_string()]);
        table.row(vec!["CBC".to_string(), "12".to_string()]);
        let rendered = table.render();

        let widths: Vec<usize> = rendered.lines().map(|l| l.width()).collect();
        assert!(widths.windows(2).all(|w| w[0] == w[1]), "{}", rendered);
        assert!(rendered.contains("│ CBC        │    12 │"));
    }

    #[test]
    fn test_footer_is_separated() {
        let mut table = TextTable::new("Title", &["A", "B"]);
        table.row(vec!["x".to_string(), "1".to_string()]);
        table.footer(vec!["Total".to_string(), "1".to_string()]);
        let rendered = table.render();
        assert!(rendered.starts_with("Title\n"));
        assert_eq!(rendered.matches('├').count(), 2);
    }

    #[test]
    fn test_summary_table_no_data() {
        let rendered = summary_table(&PeriodStatistics::no_data()).render();
        assert!(rendered.contains("dispatch"));
        assert!(rendered.contains("No Data"));
        assert!(rendered.contains("Total"));
    }

    fn metadata(loaded: usize, in_range: usize) -> AnalysisMetadata {
        AnalysisMetadata {
            generated_at: String::new(),
            now: "2024-03-14T18:00:00+00:00".to_string(),
            timezone: "UTC".to_string(),
            range: None,
            files_read: 2,
            records_loaded: loaded,
            records_in_range: in_range,
            records_skipped: 0,
            duplicates: 0,
            valid_samples: in_range,
            load_time_seconds: 0.0,
            analysis_time_seconds: 0.0,
        }
    }

    #[test]
    fn test_metadata_line_shows_range_share() {
        assert!(metadata_line(&metadata(3, 3)).starts_with("3 records (3 valid) from 2 files"));
        assert!(metadata_line(&metadata(3, 2)).starts_with("2 of 3 records (2 valid)"));
    }

    #[test]
    fn test_stat_text_includes_count() {
        let cell = StatCell {
            current: "1h 5m".to_string(),
            raw_minutes: 65.0,
            count: 4,
        };
        assert_eq!(stat_text(&cell), "1h 5m (4)");
        assert_eq!(stat_text(&StatCell::no_data()), "No Data");
    }
}
