use criterion::{criterion_group, criterion_main, Criterion};
use sable_lib::board::Board;

fn perft_speed(c: &mut Criterion) {
    let board = Board::new();
    c.bench_function("perft 4 from the start position", |b| {
        b.iter(|| assert_eq!(board.perft(4), 197_281))
    });

    let kiwipete =
        Board::from_fen("r3k2r/p1ppqpb1/bn2pnp1/3PN3/1p2P3/2N2Q1p/PPPBBPPP/R3K2R w KQkq - 0 1")
            .unwrap();
    c.bench_function("perft 3 kiwipete", |b| {
        b.iter(|| assert_eq!(kiwipete.perft(3), 97_862))
    });
}

criterion_group!(benches, perft_speed);
criterion_main!(benches);
