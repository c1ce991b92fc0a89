//! Benchmarks for layout reconstruction and packaging.
//!
//! Run with: cargo bench
//!
//! Pages are synthetic: a heading, a few body paragraphs, two columns and a table.

use criterion::{black_box, criterion_group, criterion_main, Criterion};

use redocx::{LayoutOptions, MemoryProvider, Pipeline, RawItem, RawPage, RenderOptions};

/// Creates a synthetic page with mixed structure.
fn create_test_page(index: usize) -> RawPage {
    let mut page = RawPage::new(index).with_size(612.0, 792.0);

    page.push(
        RawItem::text([72.0, 60.0, 540.0, 78.0], format!("Chapter {}", index + 1))
            .with_size(18.0)
            .bold(),
    );

    // Two columns of body text
    for (column, left) in [72.0f32, 320.0].iter().enumerate() {
        let mut top = 100.0;
        for paragraph in 0..4 {
            for line in 0..5 {
                let text = format!(
                    "Column {} paragraph {} line {} of the benchmark body text.",
                    column, paragraph, line
                );
                let bbox = [*left, top, left + 220.0, top + 10.0];
                page.push(RawItem::text(bbox, text).with_size(10.0));
                top += 12.0;
            }
            top += 14.0;
        }
    }

    // A 4x4 table below the columns
    for row in 0..4 {
        let top = 520.0 + row as f32 * 24.0;
        for col in 0..4 {
            let left = 72.0 + col as f32 * 120.0;
            page.push(
                RawItem::text([left, top, left + 80.0, top + 10.0], format!("R{}C{}", row, col))
                    .with_size(10.0),
            );
        }
    }

    page
}

fn create_provider(page_count: usize) -> MemoryProvider {
    MemoryProvider::new((0..page_count).map(create_test_page).collect())
}

/// Benchmark the full reconstruction pipeline at various sizes.
fn bench_reconstruction(c: &mut Criterion) {
    let mut group = c.benchmark_group("reconstruction");

    for page_count in [1, 10, 50].iter() {
        let provider = create_provider(*page_count);

        group.bench_function(format!("{}_pages_parallel", page_count), |b| {
            b.iter(|| {
                Pipeline::new(black_box(&provider), LayoutOptions::default())
                    .run()
                    .unwrap()
            });
        });

        group.bench_function(format!("{}_pages_sequential", page_count), |b| {
            b.iter(|| {
                Pipeline::new(black_box(&provider), LayoutOptions::default().sequential())
                    .run()
                    .unwrap()
            });
        });
    }

    group.finish();
}

/// Benchmark DOCX serialization and verification.
fn bench_packaging(c: &mut Criterion) {
    let provider = create_provider(10);
    let document = Pipeline::new(&provider, LayoutOptions::default())
        .run()
        .unwrap()
        .document;
    let options = RenderOptions::default();

    c.bench_function("to_docx_10_pages", |b| {
        b.iter(|| redocx::render::to_docx(black_box(&document), &options).unwrap());
    });

    let bytes = redocx::render::to_docx(&document, &options).unwrap();
    c.bench_function("verify_package_10_pages", |b| {
        b.iter(|| redocx::verify_package(black_box(&bytes)).unwrap());
    });
}

criterion_group!(benches, bench_reconstruction, bench_packaging);
criterion_main!(benches);
