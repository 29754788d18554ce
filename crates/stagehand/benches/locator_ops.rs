//! Locator Operations Benchmarks
//!
//! Textual query parsing and resolution over large component forests.
//!
//! Run with: `cargo bench --bench locator_ops`

#![allow(missing_docs)]
#![allow(clippy::unwrap_used)]

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use stagehand::testing::FakeSession;
use stagehand::{Component, Locator, Scope};

/// `width` panels of `width` rows, each row a label and a checkbox
fn forest(width: usize) -> Vec<Component> {
    let panels = (0..width).map(|p| {
        Component::new("div")
            .with_class("Panel")
            .with_attr("title", format!("panel-{p}"))
            .with_children((0..width).map(|r| {
                Component::new("div")
                    .with_class("Row")
                    .with_child(Component::new("label").with_text(format!("row {p}.{r}")))
                    .with_child(
                        Component::new("div")
                            .with_class("JCheckBox")
                            .with_selected(r % 2 == 0),
                    )
            }))
    });
    vec![Component::new("div").with_class("Frame").with_children(panels)]
}

fn bench_parsing(c: &mut Criterion) {
    let mut group = c.benchmark_group("locator_parsing");

    let expressions = [
        ("tag", "//button"),
        ("attribute", "//div[@title='Settings']"),
        ("contains", "//div[contains(@class, 'JCheckBox')]"),
        (
            "conjunction",
            "//div[contains(@class, 'TreeNode') and contains(@text, 'Version Control')]",
        ),
        ("regex", "//*[matches(@text, '^row [0-9]+\\.1$')]"),
    ];

    for (name, expression) in expressions {
        group.bench_with_input(BenchmarkId::from_parameter(name), &expression, |b, expr| {
            b.iter(|| Locator::parse(black_box(expr)).unwrap());
        });
    }

    group.finish();
}

fn bench_resolve_all(c: &mut Criterion) {
    let mut group = c.benchmark_group("resolve_all");

    for width in [10, 30, 60] {
        let session = FakeSession::new(forest(width));
        let checkboxes = Locator::any().class_contains("JCheckBox").attr_eq("selected", "true");
        group.bench_with_input(BenchmarkId::new("checkboxes", width), &session, |b, s| {
            b.iter(|| black_box(checkboxes.resolve_all(s).unwrap()));
        });

        let last = Locator::tag("label").text_eq(format!("row {0}.{0}", width - 1));
        group.bench_with_input(BenchmarkId::new("last_label", width), &session, |b, s| {
            b.iter(|| black_box(last.resolve_one(s).unwrap()));
        });
    }

    group.finish();
}

fn bench_scoped(c: &mut Criterion) {
    let mut group = c.benchmark_group("scoped_resolve");
    let session = FakeSession::new(forest(60));

    let panel = session.find_now(&Locator::any().attr_eq("title", "panel-30")).unwrap();
    let scoped = Locator::any().class_contains("JCheckBox").within(&panel);
    group.bench_function("derived_scope", |b| {
        b.iter(|| black_box(scoped.resolve_all(&session).unwrap()));
    });

    let fixed = Locator::any()
        .class_contains("JCheckBox")
        .within_scope(Scope::at(panel.component().path().clone()));
    group.bench_function("fixed_scope", |b| {
        b.iter(|| black_box(fixed.resolve_all(&session).unwrap()));
    });

    group.finish();
}

criterion_group!(benches, bench_parsing, bench_resolve_all, bench_scoped);
criterion_main!(benches);
