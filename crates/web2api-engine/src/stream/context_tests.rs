use super::*;

fn emitted(ctx: &mut StreamContext, snapshots: &[&str]) -> Vec<String> {
    snapshots
        .iter()
        .filter_map(|s| match ctx.observe(s) {
            Observation::Emit(delta) => Some(delta),
            _ => None,
        })
        .collect()
}

#[test]
fn test_growing_snapshots_emit_suffixes() {
    let mut ctx = StreamContext::new(0, 3);
    let chunks = emitted(&mut ctx, &["", "Hel", "Hello", "Hello wor", "Hello world"]);
    assert_eq!(chunks, vec!["Hel", "lo", " wor", "ld"]);
    assert_eq!(chunks.concat(), "Hello world");
    assert_eq!(ctx.sent_content_len(), 11);
}

#[test]
fn test_small_shrink_is_jitter() {
    let mut ctx = StreamContext::new(0, 3);
    assert_eq!(ctx.observe("Hello world"), Observation::Emit("Hello world".into()));
    assert_eq!(ctx.observe("Hello wor"), Observation::Jitter);
    assert_eq!(ctx.sent_content_len(), 11);
}

#[test]
fn test_large_shrink_is_rerender() {
    let mut ctx = StreamContext::new(0, 3);
    ctx.observe("Hello world");
    ctx.observe("Hello world");
    assert_eq!(ctx.stable_text_count(), 1);

    assert_eq!(ctx.observe("Hel"), Observation::Rerender);
    assert_eq!(ctx.stable_text_count(), 0);
    assert_eq!(ctx.sent_content_len(), 11);

    // Re-rendered text catching up emits nothing twice.
    assert_eq!(ctx.observe("Hello world"), Observation::Stable(1));
    assert_eq!(ctx.observe("Hello world!"), Observation::Emit("!".into()));
}

#[test]
fn test_baseline_excludes_user_turn() {
    let mut ctx = StreamContext::new(5, 3);
    assert_eq!(ctx.observe("Hi!\n\n"), Observation::Stable(1));
    assert_eq!(ctx.observe("Hi!\n\nSure"), Observation::Emit("Sure".into()));
    assert_eq!(ctx.sent_content_len(), 4);
    assert_eq!(ctx.baseline_len(), 5);
}

#[test]
fn test_unchanged_counts_stable() {
    let mut ctx = StreamContext::new(0, 3);
    ctx.observe("done");
    assert_eq!(ctx.observe("done"), Observation::Stable(1));
    assert_eq!(ctx.observe("done"), Observation::Stable(2));
    assert_eq!(ctx.last_stable_text(), "done");
    assert_eq!(ctx.idle_tick(), 3);
}

#[test]
fn test_counts_chars_not_bytes() {
    let mut ctx = StreamContext::new(0, 3);
    assert_eq!(ctx.observe("héllo"), Observation::Emit("héllo".into()));
    assert_eq!(ctx.observe("héllo wörld"), Observation::Emit(" wörld".into()));
    assert_eq!(ctx.sent_content_len(), 11);
}

#[test]
fn test_settled_shrink_counts_stable() {
    let mut ctx = StreamContext::new(0, 3);
    ctx.observe("Hello **world** again");

    assert_eq!(ctx.observe("Hello world again"), Observation::Rerender);
    assert_eq!(ctx.observe("Hello world again"), Observation::Stable(1));
    assert_eq!(ctx.observe("Hello world again"), Observation::Stable(2));
    assert_eq!(ctx.sent_content_len(), 21);
}

#[test]
fn test_settled_jitter_counts_stable() {
    let mut ctx = StreamContext::new(0, 3);
    ctx.observe("Hello world");
    assert_eq!(ctx.observe("Hello wor"), Observation::Jitter);
    assert_eq!(ctx.observe("Hello wor"), Observation::Stable(1));
}

#[test]
fn test_for_turn_seeds_previous_snapshot() {
    let mut ctx = StreamContext::for_turn("Hi", 3);
    assert_eq!(ctx.baseline_len(), 2);
    assert_eq!(ctx.observe("Hi"), Observation::Stable(1));
    assert_eq!(ctx.observe("Hi there"), Observation::Emit(" there".into()));
}

#[test]
fn test_sent_len_never_decreases() {
    let mut ctx = StreamContext::new(0, 3);
    let ticks = ["a", "abc", "ab", "", "abcdef", "abc", "abcdefgh", "abcdefgh", "x"];
    let mut last = 0;
    for tick in ticks {
        ctx.observe(tick);
        assert!(ctx.sent_content_len() >= last, "regressed at {:?}", tick);
        last = ctx.sent_content_len();
    }
    assert_eq!(last, 8);
}
