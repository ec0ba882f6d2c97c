//! Tick synthesis benchmark
//!
//! Synthesis runs on every order-book delta, so it sits on the hot path
//! between feed and strategy.

use chrono::{TimeZone, Utc};
use criterion::{black_box, criterion_group, criterion_main, Criterion};
use poly_updown::feed::PriceTick;
use poly_updown::market::MarketDef;
use poly_updown::orderbook::{BookUpdate, OrderBook, PriceLevel};
use poly_updown::tick::TickSynth;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

fn deep_book(levels: usize) -> OrderBook {
    let mut book = OrderBook::new("up-tok");
    for i in 0..levels {
        book.bids.push(PriceLevel {
            price: dec!(0.50) - Decimal::new(i as i64, 3),
            size: dec!(100) + Decimal::from(i as i64),
        });
        book.asks.push(PriceLevel {
            price: dec!(0.52) + Decimal::new(i as i64, 3),
            size: dec!(100) + Decimal::from(i as i64),
        });
    }
    book
}

fn bench_tick_synthesis(c: &mut Criterion) {
    let mut synth = TickSynth::new();
    synth.set_market(MarketDef {
        slug: "btc-updown-15m-1767636000".to_string(),
        crypto: "BTC".to_string(),
        up_token_id: "up-tok".to_string(),
        down_token_id: "down-tok".to_string(),
        window_epoch: 1_767_636_000,
        end_time: Utc.timestamp_opt(1_767_636_900, 0).single().unwrap(),
    });
    synth.on_spot(PriceTick {
        crypto: "BTC".to_string(),
        symbol: "BTCUSDT".to_string(),
        price: dec!(95000),
        timestamp: Utc::now(),
        exchange_ts: Utc::now(),
    });
    let now = Utc.timestamp_opt(1_767_636_600, 0).single().unwrap();

    let snapshot = BookUpdate::Snapshot(deep_book(20));
    c.bench_function("tick_synthesis_snapshot", |b| {
        b.iter(|| black_box(synth.on_book(black_box(snapshot.clone()), now)))
    });

    let delta = BookUpdate::Delta(deep_book(2));
    c.bench_function("tick_synthesis_delta", |b| {
        b.iter(|| black_box(synth.on_book(black_box(delta.clone()), now)))
    });
}

criterion_group!(benches, bench_tick_synthesis);
criterion_main!(benches);
