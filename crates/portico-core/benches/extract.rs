//! Benchmarks for the extraction pipeline and the style sanitizer.

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use portico_core::{Extractor, sanitize};
use portico_types::PorticoConfig;

/// A backend page with `n` sidebar links, `n` table rows, and a stylesheet
/// of `n` rules.
fn generate_page(n: usize) -> String {
    let mut html = String::from("<!DOCTYPE html><html><head><style>");
    html.push_str(&generate_css(n));
    html.push_str(
        "</style><link rel=\"stylesheet\" href=\"/assets/desk.css\"></head><body>\
         <div class=\"sidebar-items\">",
    );
    for i in 0..n {
        html.push_str(&format!("<a href=\"/app/doc-{i}\">Doc {i}</a>"));
    }
    html.push_str("</div><main><table>");
    for i in 0..n {
        html.push_str(&format!(
            "<tr style=\"background:url(/img/{i}.png)\"><td><img src=\"/files/{i}.png\"></td>\
             <td><script>track({i})</script>{i}</td></tr>"
        ));
    }
    html.push_str("</table></main></body></html>");
    html
}

fn generate_css(n: usize) -> String {
    (0..n)
        .map(|i| {
            format!(
                ".r{i}{{color:#{i:03};transform:scale(1.{i});background:url(/img/{i}.png)}}"
            )
        })
        .collect()
}

fn bench_extract(c: &mut Criterion) {
    let extractor = Extractor::new(&PorticoConfig {
        backend_origin: "https://erp.example.com".to_string(),
        ..PorticoConfig::default()
    })
    .unwrap();
    let mut group = c.benchmark_group("extract");
    for n in [20, 100, 500] {
        let html = generate_page(n);
        group.bench_with_input(BenchmarkId::new("navigation", n), &html, |b, html| {
            b.iter(|| extractor.extract_navigation(html));
        });
        group.bench_with_input(BenchmarkId::new("content", n), &html, |b, html| {
            b.iter(|| extractor.extract_content(html));
        });
    }
    group.finish();
}

fn bench_sanitize(c: &mut Criterion) {
    let mut group = c.benchmark_group("sanitize");
    for n in [20, 100, 500] {
        let css = generate_css(n);
        group.bench_with_input(BenchmarkId::new("stylesheet", n), &css, |b, css| {
            b.iter(|| sanitize(css));
        });
    }
    group.finish();
}

criterion_group!(benches, bench_extract, bench_sanitize);
criterion_main!(benches);
