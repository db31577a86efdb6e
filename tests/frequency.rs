use ironsift::{FrequencyMap, Merge, Tally, reduce, reduce_tree};

fn map(pairs: &[(&str, u64)]) -> FrequencyMap {
    pairs.iter().map(|&(k, n)| (k, n)).collect()
}

#[test]
fn merge_sums_keywise() {
    let mut a = map(&[("1.1.1.1", 2), ("2.2.2.2", 1)]);
    a.merge(map(&[("2.2.2.2", 4), ("3.3.3.3", 1)]));
    assert_eq!(a.get("1.1.1.1"), 2);
    assert_eq!(a.get("2.2.2.2"), 5);
    assert_eq!(a.get("3.3.3.3"), 1);
    assert_eq!(a.get("absent"), 0);
    assert_eq!(a.total(), 8);
}

#[test]
fn merge_with_empty_is_identity() {
    let a = map(&[("x", 3)]);
    let mut b = a.clone();
    b.merge(FrequencyMap::new());
    assert_eq!(a, b);

    let mut c = FrequencyMap::new();
    c.merge(a.clone());
    assert_eq!(a, c);
}

#[test]
fn flat_and_tree_reduce_agree_in_any_order() {
    let parts = vec![
        map(&[("a", 1), ("b", 2)]),
        map(&[]),
        map(&[("b", 3), ("c", 1)]),
        map(&[("a", 10)]),
    ];
    let flat = reduce(parts.clone());
    let mut reversed = parts.clone();
    reversed.reverse();
    assert_eq!(reduce(reversed), flat);
    assert_eq!(reduce_tree(parts), flat);
    assert_eq!(flat.to_sorted().into_iter().collect::<Vec<_>>(), vec![
        ("a".to_string(), 11),
        ("b".to_string(), 5),
        ("c".to_string(), 1),
    ]);
}

#[test]
fn reduce_of_nothing_is_empty() {
    let m: FrequencyMap = reduce(Vec::new());
    assert!(m.is_empty());
}

#[test]
fn extend_counts_each_key_once() {
    let mut m = FrequencyMap::new();
    m.extend(["k", "k", "j"]);
    assert_eq!(m.get("k"), 2);
    assert_eq!(m.get("j"), 1);
}

#[test]
fn tallies_merge_including_categories() {
    use ironsift::Category;
    let mut a = Tally {
        records_seen: 5,
        matched: 3,
        malformed: 1,
        ..Default::default()
    };
    a.by_category.insert(Category::Generic, 3);
    let mut b = Tally {
        records_seen: 2,
        matched: 2,
        ..Default::default()
    };
    b.by_category.insert(Category::FailedAuth, 2);

    let t = reduce([a, b]);
    assert_eq!(t.records_seen, 7);
    assert_eq!(t.matched, 5);
    assert_eq!(t.malformed, 1);
    assert_eq!(t.by_category.len(), 2);
}
