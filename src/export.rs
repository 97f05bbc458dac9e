use chrono::{Local, NaiveDate};
use clap::ValueEnum;
use csv::{QuoteStyle, WriterBuilder};
use serde::Serialize;

use crate::models::{MaterialRecord, TimeRange};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ExportFormat {
    Csv,
    Json,
}

impl ExportFormat {
    pub fn extension(self) -> &'static str {
        match self {
            ExportFormat::Csv => "csv",
            ExportFormat::Json => "json",
        }
    }

    pub fn mime(self) -> &'static str {
        match self {
            ExportFormat::Csv => "text/csv;charset=utf-8",
            ExportFormat::Json => "application/json",
        }
    }
}

#[derive(Debug)]
pub struct Export {
    pub filename: String,
    pub mime: &'static str,
    pub body: String,
}

/// Serializes the filtered record set into a downloadable document.
/// An empty set produces no document; the caller tells the user there is
/// no data to export.
pub fn build_export(
    records: &[MaterialRecord],
    range: TimeRange,
    format: ExportFormat,
    today: NaiveDate,
) -> anyhow::Result<Option<Export>> {
    if records.is_empty() {
        return Ok(None);
    }

    let body = match format {
        ExportFormat::Csv => csv_document(records)?,
        ExportFormat::Json => json_document(records)?,
    };

    Ok(Some(Export {
        filename: export_filename(range, format, today),
        mime: format.mime(),
        body,
    }))
}

pub fn export_filename(range: TimeRange, format: ExportFormat, today: NaiveDate) -> String {
    format!(
        "my-materials-{}-{}.{}",
        range.slug(),
        today.format("%Y-%m-%d"),
        format.extension()
    )
}

/// Rows in the same (descending) order as the filtered set. String fields
/// are quoted with internal quotes doubled; timestamps are local time.
pub fn csv_document(records: &[MaterialRecord]) -> anyhow::Result<String> {
    let mut writer = WriterBuilder::new()
        .quote_style(QuoteStyle::NonNumeric)
        .from_writer(vec![]);

    writer.write_record([
        "Title",
        "Category",
        "School",
        "Course",
        "Uploaded At",
        "Views",
        "Downloads",
        "Diamonds",
        "Earnings ($)",
    ])?;

    for record in records {
        let uploaded_at = record
            .created_at
            .with_timezone(&Local)
            .format("%Y-%m-%d %H:%M:%S")
            .to_string();
        let views = record.views.to_string();
        let downloads = record.downloads.to_string();
        let diamonds = record.diamonds.to_string();
        let earnings = format!("{:.2}", record.earnings);

        writer.write_record([
            record.title.as_str(),
            record.category.as_str(),
            record.school.as_str(),
            record.course.as_str(),
            uploaded_at.as_str(),
            views.as_str(),
            downloads.as_str(),
            diamonds.as_str(),
            earnings.as_str(),
        ])?;
    }

    Ok(String::from_utf8(writer.into_inner()?)?)
}

#[derive(Serialize)]
struct ExportRow<'a> {
    title: &'a str,
    category: &'a str,
    school: &'a str,
    course: &'a str,
    created_at: String,
    views: i64,
    downloads: i64,
    diamonds: i64,
    earnings: f64,
}

pub fn json_document(records: &[MaterialRecord]) -> anyhow::Result<String> {
    let rows: Vec<ExportRow> = records
        .iter()
        .map(|record| ExportRow {
            title: &record.title,
            category: &record.category,
            school: &record.school,
            course: &record.course,
            created_at: record.created_at.to_rfc3339(),
            views: record.views,
            downloads: record.downloads,
            diamonds: record.diamonds,
            earnings: record.earnings,
        })
        .collect();

    Ok(serde_json::to_string_pretty(&rows)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, TimeZone, Utc};
    use uuid::Uuid;

    fn material(title: &str, created_at: DateTime<Utc>, earnings: f64) -> MaterialRecord {
        MaterialRecord {
            id: Uuid::new_v4().to_string(),
            owner_id: Uuid::nil(),
            title: title.to_string(),
            category: "Notes".to_string(),
            school: "UNILAG".to_string(),
            course: "MTH 202".to_string(),
            views: 12,
            downloads: 3,
            diamonds: 5,
            earnings,
            created_at,
        }
    }

    fn local_instant(y: i32, m: u32, d: u32, h: u32) -> DateTime<Utc> {
        Local
            .with_ymd_and_hms(y, m, d, h, 4, 5)
            .unwrap()
            .with_timezone(&Utc)
    }

    #[test]
    fn csv_header_and_row_shape() {
        let body = csv_document(&[material("Algebra", local_instant(2026, 3, 5, 9), 2.5)]).unwrap();
        let mut lines = body.lines();

        assert_eq!(
            lines.next().unwrap(),
            "\"Title\",\"Category\",\"School\",\"Course\",\"Uploaded At\",\"Views\",\"Downloads\",\"Diamonds\",\"Earnings ($)\""
        );
        assert_eq!(
            lines.next().unwrap(),
            "\"Algebra\",\"Notes\",\"UNILAG\",\"MTH 202\",\"2026-03-05 09:04:05\",12,3,5,2.50"
        );
        assert!(lines.next().is_none());
    }

    #[test]
    fn csv_round_trips_titles_with_embedded_quotes() {
        let original = "He said \"hi\"";
        let body = csv_document(&[material(original, Utc::now(), 0.0)]).unwrap();
        assert!(body.contains("\"He said \"\"hi\"\"\""));

        let mut reader = csv::Reader::from_reader(body.as_bytes());
        let row = reader.records().next().unwrap().unwrap();
        assert_eq!(&row[0], original);
    }

    #[test]
    fn csv_earnings_always_have_two_decimals() {
        let body = csv_document(&[material("a", Utc::now(), 7.0)]).unwrap();
        assert!(body.contains(",7.00"));
    }

    #[test]
    fn csv_rows_keep_the_filtered_order() {
        let records = vec![
            material("newest", local_instant(2026, 3, 6, 10), 0.0),
            material("older", local_instant(2026, 3, 4, 10), 0.0),
        ];
        let body = csv_document(&records).unwrap();
        let lines: Vec<&str> = body.lines().collect();
        assert!(lines[1].starts_with("\"newest\""));
        assert!(lines[2].starts_with("\"older\""));
    }

    #[test]
    fn json_rows_expose_the_exact_key_set() {
        let body = json_document(&[material("Algebra", Utc::now(), 1.25)]).unwrap();
        let rows: serde_json::Value = serde_json::from_str(&body).unwrap();
        let row = &rows[0];

        for key in [
            "title",
            "category",
            "school",
            "course",
            "created_at",
            "views",
            "downloads",
            "diamonds",
            "earnings",
        ] {
            assert!(row.get(key).is_some(), "missing key {key}");
        }
        assert_eq!(row["earnings"], 1.25);
        // pretty-printed, two-space indent
        assert!(body.starts_with("[\n  {\n    \"title\""));
    }

    #[test]
    fn empty_set_produces_no_document() {
        let today = NaiveDate::from_ymd_opt(2026, 3, 5).unwrap();
        for format in [ExportFormat::Csv, ExportFormat::Json] {
            let export = build_export(&[], TimeRange::Last30Days, format, today).unwrap();
            assert!(export.is_none());
        }
    }

    #[test]
    fn filenames_follow_the_download_convention() {
        let today = NaiveDate::from_ymd_opt(2026, 3, 5).unwrap();
        assert_eq!(
            export_filename(TimeRange::Last30Days, ExportFormat::Csv, today),
            "my-materials-30d-2026-03-05.csv"
        );
        assert_eq!(
            export_filename(TimeRange::AllTime, ExportFormat::Json, today),
            "my-materials-all-2026-03-05.json"
        );
    }

    #[test]
    fn export_bundle_carries_mime_and_body() {
        let today = NaiveDate::from_ymd_opt(2026, 3, 5).unwrap();
        let records = vec![material("Algebra", Utc::now(), 0.5)];
        let export = build_export(&records, TimeRange::Last7Days, ExportFormat::Csv, today)
            .unwrap()
            .unwrap();
        assert_eq!(export.mime, "text/csv;charset=utf-8");
        assert!(export.body.lines().count() == 2);
    }
}
