use std::rc::Rc;
use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use vista_core::{
    h, viewport, Component, DefaultScheduler, Fingerprinter, MountedInstance, Node, Props,
    RenderContext, Runtime,
};

const ROW_SAMPLES: &[usize] = &[8, 32, 128];

struct Row {
    index: usize,
    label: Rc<str>,
}

impl Props for Row {
    fn fingerprint(&self, f: &mut Fingerprinter<'_>) {
        f.field("index", &self.index).field("label", &self.label);
    }
}

fn row(_cx: &RenderContext, props: &Row) -> Node {
    h("li")
        .key(props.index)
        .child(h("span").class("index").text(props.index))
        .child(h("span").class("label").text(&props.label))
        .build()
}

fn table(cx: &RenderContext, rows: &[Row]) -> Node {
    h("ul")
        .children(rows.iter().map(|props| cx.memo(row, props)))
        .build()
}

fn rows(count: usize) -> Vec<Row> {
    let label: Rc<str> = Rc::from("row");
    (0..count)
        .map(|index| Row {
            index,
            label: Rc::clone(&label),
        })
        .collect()
}

fn bench_memo_hits(c: &mut Criterion) {
    let mut group = c.benchmark_group("memo_hits");
    for &count in ROW_SAMPLES {
        group.bench_with_input(BenchmarkId::new("rows", count), &count, |b, &count| {
            let cx = RenderContext::new();
            let props = rows(count);
            // Keeps every pristine output alive.
            let warm = table(&cx, &props);
            b.iter(|| black_box(table(&cx, &props)));
            drop(warm);
        });
    }
    group.finish();
}

fn bench_memo_misses(c: &mut Criterion) {
    let mut group = c.benchmark_group("memo_misses");
    for &count in ROW_SAMPLES {
        group.bench_with_input(BenchmarkId::new("rows", count), &count, |b, &count| {
            b.iter(|| {
                let cx = RenderContext::new();
                black_box(table(&cx, &rows(count)))
            });
        });
    }
    group.finish();
}

fn bench_idle_redraw(c: &mut Criterion) {
    let runtime = Runtime::new(Arc::new(DefaultScheduler));
    let component = Component::new(rows(64), |cx, rows: &Vec<Row>| table(cx, rows));
    runtime.register_components([("list", component.into_definition())]);
    let mount = viewport("list");
    runtime.document().body().append_child(&mount);
    let instance = runtime.mount(&mount).expect("mount");

    c.bench_function("idle_redraw", |b| {
        b.iter(|| black_box(instance.redraw()));
    });
}

criterion_group!(benches, bench_memo_hits, bench_memo_misses, bench_idle_redraw);
criterion_main!(benches);
