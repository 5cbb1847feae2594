//! 📊 How fast can we fold N operations into one NDJSON payload?
//! Because "it feels fast" is not a metric, and bulk assembly sits on the
//! hot path of every loader built on this crate.

use std::hint::black_box;

use criterion::{Criterion, criterion_group, criterion_main};
use esq::{EsClient, EsConfig};

fn bulk_payload(c: &mut Criterion) {
    // 🔧 No network here — payload rendering is pure string work.
    let client = EsClient::new(EsConfig::default()).expect("client construction is offline");

    for &ops in &[10usize, 1_000] {
        let mut bulk = client.prepare_bulk();
        for i in 0..ops {
            bulk.add(
                client
                    .prepare_index("bench", "doc")
                    .id(format!("doc-{i}"))
                    .source_json(format!(
                        r#"{{"seq":{i},"payload":"lorem ipsum dolor sit amet, consectetur adipiscing elit"}}"#
                    ))
                    .expect("first body set always succeeds"),
            );
        }
        c.bench_function(&format!("bulk_payload_{ops}_ops"), |b| {
            b.iter(|| black_box(bulk.payload().expect("payload renders")))
        });
    }
}

criterion_group!(benches, bulk_payload);
criterion_main!(benches);
