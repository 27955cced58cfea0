use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use mime::Mime;
use rust_xlsxwriter::{Color, DocProperties, Format, Workbook};
use tokio::fs;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::{debug, warn};

use crate::models::Project;
use crate::reports::{AccountingReport, ExportEntryRow, ReportPeriod, SupervisoryReport, UserHours};

const MARKDOWN_MIME: &str = "text/markdown; charset=utf-8";
const XLSX_MIME: &str = "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";

fn mime_or(value: &str, fallback: Mime) -> Mime {
    value.parse().unwrap_or(fallback)
}

/// A rendered document ready to be sent as a download.
#[derive(Debug)]
pub struct RenderedReport {
    pub file_name: String,
    pub content_type: Mime,
    pub bytes: Vec<u8>,
}

impl RenderedReport {
    fn pdf(stem: &str, bytes: Vec<u8>) -> Self {
        Self {
            file_name: format!("{stem}.pdf"),
            content_type: mime::APPLICATION_PDF,
            bytes,
        }
    }

    fn markdown(stem: &str, markdown: &str) -> Self {
        Self {
            file_name: format!("{stem}.md"),
            content_type: mime_or(MARKDOWN_MIME, mime::TEXT_PLAIN_UTF_8),
            bytes: markdown.as_bytes().to_vec(),
        }
    }

    fn xlsx(stem: &str, bytes: Vec<u8>) -> Self {
        Self {
            file_name: format!("{stem}.xlsx"),
            content_type: mime_or(XLSX_MIME, mime::APPLICATION_OCTET_STREAM),
            bytes,
        }
    }

    pub fn is_pdf(&self) -> bool {
        self.content_type == mime::APPLICATION_PDF
    }
}

/// Run an external converter, reporting whether it succeeded in time.
async fn run_converter(mut command: Command, limit: Duration) -> bool {
    command.kill_on_drop(true);
    match timeout(limit, command.output()).await {
        Ok(Ok(output)) if output.status.success() => true,
        Ok(Ok(output)) => {
            warn!(
                stderr = %String::from_utf8_lossy(&output.stderr),
                "pandoc failed; serving markdown instead of pdf"
            );
            false
        }
        Ok(Err(err)) => {
            warn!(error = %err, "could not run pandoc; serving markdown instead of pdf");
            false
        }
        Err(_) => {
            warn!(timeout_secs = limit.as_secs_f64(), "pandoc timed out; serving markdown instead of pdf");
            false
        }
    }
}

/// Renders reports to PDF (through pandoc) and XLSX
#[derive(Debug)]
pub struct ReportGenerator {
    output_dir: PathBuf,
    pandoc_timeout: Duration,
}

impl ReportGenerator {
    pub fn new(output_dir: impl AsRef<Path>) -> Result<Self> {
        let path = output_dir.as_ref();
        if !path.exists() {
            std::fs::create_dir_all(path)
                .with_context(|| format!("failed to create export directory {}", path.display()))?;
        }

        Ok(Self {
            output_dir: path.to_path_buf(),
            pandoc_timeout: Duration::from_secs(60),
        })
    }

    pub fn with_pandoc_timeout(mut self, limit: Duration) -> Self {
        self.pandoc_timeout = limit;
        self
    }

    /// Convert `markdown` with pandoc inside a scratch directory under the
    /// export directory. The scratch directory is removed before returning.
    /// Without a PDF from pandoc in time, the Markdown itself is returned.
    pub async fn render_pdf(&self, stem: &str, markdown: &str) -> Result<RenderedReport> {
        let scratch = tempfile::Builder::new()
            .prefix(&format!("{stem}-"))
            .tempdir_in(&self.output_dir)
            .with_context(|| format!("failed to create scratch dir in {}", self.output_dir.display()))?;
        let md_path = scratch.path().join(format!("{stem}.md"));
        let pdf_path = scratch.path().join(format!("{stem}.pdf"));

        fs::write(&md_path, markdown)
            .await
            .with_context(|| format!("failed to write {}", md_path.display()))?;

        let mut command = Command::new("pandoc");
        command.arg(&md_path).arg("-o").arg(&pdf_path);

        let rendered = if run_converter(command, self.pandoc_timeout).await {
            let bytes = fs::read(&pdf_path)
                .await
                .with_context(|| format!("failed to read {}", pdf_path.display()))?;
            debug!(stem, bytes = bytes.len(), "rendered pdf");
            RenderedReport::pdf(stem, bytes)
        } else {
            RenderedReport::markdown(stem, markdown)
        };

        if let Err(err) = scratch.close() {
            warn!(error = %err, "failed to remove scratch export directory");
        }
        Ok(rendered)
    }

    pub fn render_project_xlsx(
        &self,
        stem: &str,
        project: &Project,
        period: &ReportPeriod,
        entries: &[ExportEntryRow],
        generated_at: DateTime<Utc>,
    ) -> Result<RenderedReport> {
        let bytes = project_workbook(project, period, entries, generated_at)?;
        Ok(RenderedReport::xlsx(stem, bytes))
    }
}

fn or_placeholder(value: Option<&str>, placeholder: &'static str) -> String {
    value.filter(|v| !v.is_empty()).unwrap_or(placeholder).to_string()
}

fn project_properties(project: &Project, period: &ReportPeriod, generated_at: DateTime<Utc>) -> Vec<(&'static str, String)> {
    let mut rows = vec![
        ("Project Name", project.name.clone()),
        ("Project ID", project.id.to_string()),
        ("Contract Number", or_placeholder(project.contract_number.as_deref(), "N/A")),
        (
            "Start Date",
            project.start_date.map_or_else(|| "Not set".to_string(), |d| d.to_string()),
        ),
        (
            "End Date",
            project.end_date.map_or_else(|| "Not set".to_string(), |d| d.to_string()),
        ),
        ("Budget", format!("{:.2} hours", project.budget)),
        ("Generated on", generated_at.format("%Y-%m-%d %H:%M UTC").to_string()),
    ];
    if !period.is_all_time() {
        rows.push(("Date Range", format!("{} to {}", period.start_date, period.end_date)));
    }
    rows
}

/// Build the project workbook: a property sheet and an entry sheet.
pub fn project_workbook(
    project: &Project,
    period: &ReportPeriod,
    entries: &[ExportEntryRow],
    generated_at: DateTime<Utc>,
) -> Result<Vec<u8>> {
    let mut workbook = Workbook::new();
    let properties = DocProperties::new()
        .set_title(&format!("Project {}", project.name))
        .set_author("Timesheet Manager");
    workbook.set_properties(&properties);

    let header = Format::new().set_bold().set_background_color(Color::RGB(0xD3D3D3));

    {
        let sheet = workbook.add_worksheet();
        sheet.set_name("Project Data")?;
        sheet.set_column_width(0, 20)?;
        sheet.set_column_width(1, 40)?;
        sheet.write_string_with_format(0, 0, "Property", &header)?;
        sheet.write_string_with_format(0, 1, "Value", &header)?;
        for (idx, (property, value)) in project_properties(project, period, generated_at).iter().enumerate() {
            let row = idx as u32 + 1;
            sheet.write_string(row, 0, *property)?;
            sheet.write_string(row, 1, value)?;
        }
    }

    {
        let sheet = workbook.add_worksheet();
        sheet.set_name("Time Entries")?;
        for (col, (title, width)) in [("Date", 12), ("User", 28), ("Type", 12), ("Hours", 10), ("Description", 50)]
            .into_iter()
            .enumerate()
        {
            sheet.set_column_width(col as u16, width)?;
            sheet.write_string_with_format(0, col as u16, title, &header)?;
        }
        for (idx, entry) in entries.iter().enumerate() {
            let row = idx as u32 + 1;
            sheet.write_string(row, 0, entry.date.to_string())?;
            sheet.write_string(row, 1, &entry.user_name)?;
            sheet.write_string(row, 2, &entry.entry_type)?;
            sheet.write_number(row, 3, entry.hours)?;
            sheet.write_string(row, 4, entry.description.as_deref().unwrap_or(""))?;
        }
    }

    Ok(workbook.save_to_buffer()?)
}

fn markdown_cell(value: &str) -> String {
    value.replace('|', "\\|").replace('\n', " ")
}

pub fn project_markdown(
    project: &Project,
    period: &ReportPeriod,
    summary: &[UserHours],
    generated_at: DateTime<Utc>,
) -> String {
    let mut content = String::new();

    content.push_str("# Project Report\n\n");
    let _ = writeln!(content, "## {}\n", project.name);
    for (property, value) in project_properties(project, period, generated_at) {
        let _ = writeln!(content, "- **{property}:** {value}");
    }
    content.push('\n');

    if !summary.is_empty() {
        content.push_str("| User | Hours |\n|---|---:|\n");
        let mut total = 0.0;
        for user in summary {
            total += user.hours;
            let _ = writeln!(content, "| {} | {:.2} |", markdown_cell(&user.user_name), user.hours);
        }
        let _ = writeln!(content, "| **Total** | **{total:.2}** |");
    }

    content
}

pub fn accounting_markdown(report: &AccountingReport) -> String {
    let mut content = String::new();

    content.push_str("# Accounting Report\n\n");
    let _ = writeln!(content, "- **Project:** {}", report.project.name);
    let _ = writeln!(
        content,
        "- **Contract Number:** {}",
        or_placeholder(report.project.contract_number.as_deref(), "N/A")
    );
    let _ = writeln!(
        content,
        "- **Funding Source:** {} ({:.2}%, allocation {:.2})",
        report.funding_source.name, report.funding_source.percentage, report.funding_source.allocation
    );
    let _ = writeln!(
        content,
        "- **Period:** {} to {}\n",
        report.period.start_date, report.period.end_date
    );

    for month in &report.monthly_reports {
        let _ = writeln!(content, "## {}\n", month.month);
        content.push_str("| Date | User | Hours | Funded % | Funded hours | Description |\n");
        content.push_str("|---|---|---:|---:|---:|---|\n");
        for user in &month.user_entries {
            for entry in &user.entries {
                let _ = writeln!(
                    content,
                    "| {} | {} | {:.2} | {:.2} | {:.2} | {} |",
                    entry.date,
                    markdown_cell(&user.user_name),
                    entry.hours,
                    entry.percentage,
                    entry.funded_hours,
                    markdown_cell(entry.description.as_deref().unwrap_or(""))
                );
            }
        }
        let _ = writeln!(content, "\nMonth total: **{:.2}** hours\n", month.total);
    }

    content.push_str("## Totals\n\n| User | Funded hours |\n|---|---:|\n");
    for user in &report.user_totals {
        let _ = writeln!(content, "| {} | {:.2} |", markdown_cell(&user.user_name), user.total);
    }
    let _ = writeln!(content, "| **Grand total** | **{:.2}** |", report.grand_total);

    content
}

pub fn supervisory_markdown(report: &SupervisoryReport) -> String {
    let mut content = String::new();

    content.push_str("# Supervisory Report\n\n");
    let _ = writeln!(content, "- **Project:** {}", report.project.name);
    let _ = writeln!(
        content,
        "- **Contract Number:** {}",
        or_placeholder(report.project.contract_number.as_deref(), "N/A")
    );
    let _ = writeln!(
        content,
        "- **Period:** {} to {}\n",
        report.period.start_date, report.period.end_date
    );

    for user in &report.users {
        let _ = writeln!(content, "## {} ({})\n", user.user_name, user.email);
        let _ = writeln!(
            content,
            "Workload: {:.2} h/week. Total: **{:.2}** hours\n",
            user.workload, user.total_hours
        );
        content.push_str("| Date | Type | Hours | Funding | Description |\n|---|---|---:|---|---|\n");
        for entry in &user.entries {
            let _ = writeln!(
                content,
                "| {} | {} | {:.2} | {} | {} |",
                entry.date,
                entry.entry_type,
                entry.hours,
                markdown_cell(&entry.funding_distribution),
                markdown_cell(entry.description.as_deref().unwrap_or(""))
            );
        }
        content.push('\n');
    }

    content
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reports::{ReportFundingSource, ReportProject, UserTotal};
    use chrono::NaiveDate;

    fn project() -> Project {
        Project {
            id: 11,
            name: "Harbour survey".into(),
            description: None,
            start_date: NaiveDate::from_ymd_opt(2024, 1, 1),
            end_date: None,
            budget: 320.0,
            contract_number: None,
            min_workload: 0.0,
            created_by: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn project_markdown_lists_properties_and_totals() {
        let period = ReportPeriod::new(NaiveDate::from_ymd_opt(2024, 3, 1), NaiveDate::from_ymd_opt(2024, 3, 31));
        let summary = vec![
            UserHours { user_id: 1, user_name: "Ada".into(), hours: 3.5 },
            UserHours { user_id: 2, user_name: "Ben | QA".into(), hours: 1.25 },
        ];
        let md = project_markdown(&project(), &period, &summary, Utc::now());
        assert!(md.contains("## Harbour survey"));
        assert!(md.contains("**Contract Number:** N/A"));
        assert!(md.contains("**Budget:** 320.00 hours"));
        assert!(md.contains("**End Date:** Not set"));
        assert!(md.contains("**Date Range:** 2024-03-01 to 2024-03-31"));
        assert!(md.contains("| Ben \\| QA | 1.25 |"));
        assert!(md.contains("**4.75**"));
    }

    #[test]
    fn all_time_exports_omit_the_date_range() {
        let md = project_markdown(&project(), &ReportPeriod::new(None, None), &[], Utc::now());
        assert!(!md.contains("Date Range"));
    }

    #[test]
    fn accounting_markdown_includes_grand_total() {
        let report = AccountingReport {
            project: ReportProject { id: 11, name: "Harbour survey".into(), contract_number: Some("C-9".into()) },
            funding_source: ReportFundingSource { id: 2, name: "EU Grant".into(), allocation: 1000.0, percentage: 60.0 },
            period: ReportPeriod::new(None, None),
            monthly_reports: Vec::new(),
            user_totals: vec![UserTotal { user_id: 1, user_name: "Ada".into(), total: 6.0 }],
            grand_total: 6.0,
        };
        let md = accounting_markdown(&report);
        assert!(md.contains("EU Grant (60.00%, allocation 1000.00)"));
        assert!(md.contains("| **Grand total** | **6.00** |"));
    }

    #[test]
    fn workbook_is_a_zip_archive() {
        let bytes = project_workbook(&project(), &ReportPeriod::new(None, None), &[], Utc::now()).unwrap();
        assert_eq!(&bytes[..2], b"PK");
    }

    #[tokio::test]
    async fn pdf_rendering_always_yields_a_document() {
        let dir = tempfile::tempdir().unwrap();
        let generator = ReportGenerator::new(dir.path()).unwrap();
        let rendered = generator.render_pdf("project-11-export", "# Hello\n").await.unwrap();
        if rendered.is_pdf() {
            assert_eq!(rendered.file_name, "project-11-export.pdf");
            assert_eq!(&rendered.bytes[..4], b"%PDF");
        } else {
            assert_eq!(rendered.file_name, "project-11-export.md");
            assert_eq!(rendered.bytes, b"# Hello\n");
            assert_eq!(rendered.content_type.essence_str(), "text/markdown");
        }
    }

    #[tokio::test]
    async fn rendering_leaves_nothing_in_the_export_dir() {
        let dir = tempfile::tempdir().unwrap();
        let generator = ReportGenerator::new(dir.path()).unwrap();
        for _ in 0..3 {
            generator.render_pdf("project-4-export", "# Report\n").await.unwrap();
        }
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn hung_converter_is_abandoned() {
        let mut command = Command::new("sleep");
        command.arg("5");
        let started = std::time::Instant::now();
        assert!(!run_converter(command, Duration::from_millis(100)).await);
        assert!(started.elapsed() < Duration::from_secs(4));
    }

    #[tokio::test]
    async fn missing_converter_reports_failure() {
        let command = Command::new("definitely-not-a-real-converter");
        assert!(!run_converter(command, Duration::from_secs(5)).await);
    }
}
