use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use rune_core::{aggregate, merge_by_key, AggregateMode, Catalog};
use rune_runtime::{FragmentTally, InventoryEntry, Member, MemberId};

fn synthetic_members(catalog: &Catalog, count: u64) -> Vec<Member> {
    let types = catalog.rune_types();
    let tiers = catalog.display_order();
    (0..count)
        .map(|id| {
            let inventory = (0..4u64)
                .map(|slot| {
                    let index = (id + slot) as usize;
                    let counts = [
                        (id % 5) as u32,
                        (slot % 3) as u32,
                        ((id + slot) % 4) as u32,
                        1,
                    ];
                    InventoryEntry::with_fragments(
                        types[index % types.len()].clone(),
                        tiers[index % tiers.len()].clone(),
                        FragmentTally::from_counts(counts),
                    )
                })
                .collect();
            Member {
                id: MemberId(id),
                first_name: format!("member{id}"),
                last_name: "bench".to_string(),
                inventory,
                points: None,
            }
        })
        .collect()
}

fn bench_aggregate(c: &mut Criterion) {
    let catalog = Catalog::builtin();
    let mut group = c.benchmark_group("aggregate");

    for count in [10u64, 100, 1_000] {
        let members = synthetic_members(&catalog, count);
        group.bench_with_input(BenchmarkId::new("complete", count), &members, |b, members| {
            b.iter(|| {
                aggregate(
                    members.iter().map(|m| (m.id, m.inventory.as_slice())),
                    AggregateMode::Complete(&catalog),
                )
            })
        });
        group.bench_with_input(BenchmarkId::new("sparse", count), &members, |b, members| {
            b.iter(|| {
                aggregate(
                    members.iter().map(|m| (m.id, m.inventory.as_slice())),
                    AggregateMode::Sparse,
                )
            })
        });
    }

    group.finish();
}

fn bench_merge(c: &mut Criterion) {
    let catalog = Catalog::builtin();
    let mut group = c.benchmark_group("merge_members");

    for count in [100u64, 1_000] {
        let local = synthetic_members(&catalog, count);
        let incoming: Vec<Member> = synthetic_members(&catalog, count + count / 2)
            .into_iter()
            .skip((count / 2) as usize)
            .collect();
        group.bench_with_input(BenchmarkId::new("by_id", count), &count, |b, _| {
            b.iter(|| merge_by_key(&local, &incoming, |member| member.id))
        });
    }

    group.finish();
}

criterion_group!(aggregate_benches, bench_aggregate, bench_merge);
criterion_main!(aggregate_benches);
