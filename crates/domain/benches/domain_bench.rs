use common::UserId;
use criterion::{Criterion, criterion_group, criterion_main};
use document_store::Fields;
use domain::{Address, CartLine, CartSnapshot, Charges, DocumentCodec, Money, OrderComposer};

fn make_lines(count: i64) -> Vec<CartLine> {
    (1..=count)
        .map(|v| {
            CartLine::new(
                format!("SKU-{v:03}"),
                format!("Product {v}"),
                Money::from_cents(99 * v + 1),
                (v % 3 + 1) as u32,
                format!("https://img/{v}.png"),
            )
            .unwrap()
        })
        .collect()
}

fn bench_snapshot_recompute(c: &mut Criterion) {
    let lines = make_lines(100);

    c.bench_function("domain/snapshot_100_lines", |b| {
        b.iter(|| CartSnapshot::from_lines(lines.clone()));
    });
}

fn bench_compose_from_cart(c: &mut Criterion) {
    let cart = CartSnapshot::from_lines(make_lines(50));
    let user = UserId::new("bench-user");
    let addresses = vec![Address::new("1 Main St", "Pune", "MH", "411001", "IN").as_default()];
    let composer = OrderComposer::default();
    let charges = Charges::default();

    c.bench_function("domain/compose_50_lines", |b| {
        b.iter(|| composer.compose_from_cart(&user, &cart, &addresses, &charges));
    });
}

fn bench_decode_cart_documents(c: &mut Criterion) {
    let stored: Vec<Fields> = make_lines(100).iter().map(CartLine::to_fields).collect();

    c.bench_function("domain/decode_100_cart_documents", |b| {
        b.iter(|| {
            let lines: Vec<CartLine> = stored
                .iter()
                .map(|f| CartLine::from_fields(f).unwrap())
                .collect();
            CartSnapshot::from_lines(lines)
        });
    });
}

criterion_group!(
    benches,
    bench_snapshot_recompute,
    bench_compose_from_cart,
    bench_decode_cart_documents,
);
criterion_main!(benches);
