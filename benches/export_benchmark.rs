//! Benchmarks for rapport export performance.
//!
//! Run with: cargo bench
//!
//! These benchmarks export synthetic reports of growing size in every format.

use chrono::{TimeZone, Utc};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use rapport::model::{
    Block, CalloutVariant, CellValue, Chart, ChartData, Content, Dataset, KpiCard, ListType,
    Report, Section, Table, TableHeader,
};
use rapport::{export_as, ExportFormat, ExportOptions};

/// Creates a synthetic report with `section_count` top-level sections.
fn create_test_content(section_count: usize) -> Content {
    let sections = (0..section_count)
        .map(|i| {
            let mut table = Table::new(vec![
                TableHeader::new("Région", "region"),
                TableHeader::new("Ventes", "sales"),
                TableHeader::new("Marge", "margin"),
            ]);
            for row in 0..25 {
                table.push_row::<CellValue>([
                    format!("Région {}", row).into(),
                    (1000.0 + row as f64 * 12.5).into(),
                    (row as f64 / 3.0).into(),
                ]);
            }

            let chart = Chart::new(
                "line",
                ChartData {
                    labels: (1..=12).map(|m| format!("M{}", m)).collect(),
                    datasets: vec![Dataset::new(
                        "Ventes",
                        (1..=12).map(|m| m as f64 * 10.0).collect(),
                    )],
                },
            );

            Section::new(format!("s{}", i), format!("Section {}", i + 1), 1)
                .with_block(Block::paragraph(
                    "Le chiffre d'affaires progresse sur l'ensemble des régions. ".repeat(8),
                ))
                .with_block(Block::KpiCard(
                    KpiCard::new("CA", 1250).with_unit("k€").with_change(3.1),
                ))
                .with_block(Block::callout(CalloutVariant::Info, "Données consolidées"))
                .with_child(
                    Section::new(format!("s{}-1", i), "Détail", 2)
                        .with_block(Block::Table(table))
                        .with_block(Block::list(ListType::Bulleted, ["Nord", "Sud", "Est"]))
                        .with_block(Block::Chart(chart)),
                )
        })
        .collect();

    Content::new(sections)
}

fn report() -> Report {
    let created = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
    Report::new("bench", "Rapport de performance", created)
}

/// Benchmark every format on a mid-sized report.
fn bench_formats(c: &mut Criterion) {
    let report = report();
    let content = create_test_content(5);
    let options = ExportOptions::new();

    let mut group = c.benchmark_group("export_format");
    for format in ExportFormat::ALL {
        group.bench_function(format.as_str(), |b| {
            b.iter(|| export_as(black_box(&report), black_box(&content), format, &options));
        });
    }
    group.finish();
}

/// Benchmark paginated and slide output as the report grows.
fn bench_report_size(c: &mut Criterion) {
    let report = report();
    let options = ExportOptions::new();

    let mut group = c.benchmark_group("report_size");
    for section_count in [1, 10, 50] {
        let content = create_test_content(section_count);
        for format in [ExportFormat::Pdf, ExportFormat::Pptx] {
            group.bench_with_input(
                BenchmarkId::new(format.as_str(), section_count),
                &content,
                |b, content| b.iter(|| export_as(&report, black_box(content), format, &options)),
            );
        }
    }
    group.finish();
}

/// Benchmark document model validation.
fn bench_validation(c: &mut Criterion) {
    let content = create_test_content(50);
    c.bench_function("validate", |b| {
        b.iter(|| black_box(&content).validate());
    });
}

criterion_group!(benches, bench_formats, bench_report_size, bench_validation);
criterion_main!(benches);
