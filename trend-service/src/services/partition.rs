/// Popularity Partitioner
///
/// Turns raw store candidates into the "popular" and "rising" orderings.
/// Popular corrects for channel-size bias by dividing each view count by
/// the channel's mean; rising ranks by snapshot-based view velocity,
/// floored at zero so a declining video never outranks a flat one.
use std::cmp::Ordering;

use crate::db::video_repo::CandidateRow;
use crate::models::RankedVideo;

/// `view_count / channel_avg_view`, falling back to the raw count when the
/// channel average is missing or zero.
fn normalized_view_score(view_count: i64, channel_avg_view: Option<f64>) -> f64 {
    match channel_avg_view {
        Some(avg) if avg > 0.0 => view_count as f64 / avg,
        _ => view_count as f64,
    }
}

fn cmp_f64_desc(a: Option<f64>, b: Option<f64>) -> Ordering {
    b.partial_cmp(&a).unwrap_or(Ordering::Equal)
}

/// Secondary quality key: persisted total score, raw view count otherwise.
fn quality_score(item: &RankedVideo) -> f64 {
    item.video
        .total_score
        .unwrap_or(item.video.view_count as f64)
}

fn popular_order(a: &RankedVideo, b: &RankedVideo) -> Ordering {
    cmp_f64_desc(a.normalized_view_score, b.normalized_view_score)
        .then_with(|| cmp_f64_desc(Some(quality_score(a)), Some(quality_score(b))))
        .then_with(|| b.video.view_count.cmp(&a.video.view_count))
        .then_with(|| b.video.crawled_at.cmp(&a.video.crawled_at))
}

fn rising_order(a: &RankedVideo, b: &RankedVideo) -> Ordering {
    cmp_f64_desc(a.view_velocity, b.view_velocity).then_with(|| popular_order(a, b))
}

/// Rank candidates for the popular bucket.
pub fn rank_popular(rows: Vec<CandidateRow>) -> Vec<RankedVideo> {
    let mut items: Vec<RankedVideo> = rows
        .into_iter()
        .map(|row| {
            let normalized = normalized_view_score(row.view_count, row.channel_avg_view);
            let mut item = RankedVideo::from_summary(row.into_summary());
            item.normalized_view_score = Some(normalized);
            item
        })
        .collect();

    items.sort_by(popular_order);
    items
}

/// Rank candidates for the rising bucket.
///
/// The velocity baseline is the snapshot at or before
/// `now - velocity_days`; a video with no prior snapshot has velocity 0
/// (the delta is treated as zero, never fabricated).
pub fn rank_rising(rows: Vec<CandidateRow>, velocity_days: i64) -> Vec<RankedVideo> {
    let velocity_days = velocity_days.max(1) as f64;

    let mut items: Vec<RankedVideo> = rows
        .into_iter()
        .map(|row| {
            let normalized = normalized_view_score(row.view_count, row.channel_avg_view);
            let velocity = match row.prev_view_count {
                Some(prev) => (row.view_count - prev).max(0) as f64 / velocity_days,
                None => 0.0,
            };
            let mut item = RankedVideo::from_summary(row.into_summary());
            item.normalized_view_score = Some(normalized);
            item.view_velocity = Some(velocity);
            item
        })
        .collect();

    items.sort_by(rising_order);
    items
}

fn conflicts(previous: Option<&RankedVideo>, item: &RankedVideo) -> bool {
    let Some(previous) = previous else {
        return false;
    };
    let same_category = matches!(
        (&previous.video.category, &item.video.category),
        (Some(a), Some(b)) if a == b
    );
    let same_channel = !previous.video.channel_id.is_empty()
        && previous.video.channel_id == item.video.channel_id;
    same_category || same_channel
}

/// Avoid placing two items of the same category or channel next to each
/// other: a conflicting item is deferred and reinserted at the next
/// compatible slot. A run that cannot be broken up keeps its original
/// order at the tail.
pub fn enforce_diversity(items: Vec<RankedVideo>) -> Vec<RankedVideo> {
    if items.len() < 2 {
        return items;
    }

    let mut placed: Vec<RankedVideo> = Vec::with_capacity(items.len());
    let mut deferred: Vec<RankedVideo> = Vec::new();

    for item in items {
        if conflicts(placed.last(), &item) {
            deferred.push(item);
            continue;
        }
        placed.push(item);

        // Drain deferred items as soon as the tail allows, earliest first.
        let mut progressed = true;
        while progressed {
            progressed = false;
            for i in 0..deferred.len() {
                if !conflicts(placed.last(), &deferred[i]) {
                    placed.push(deferred.remove(i));
                    progressed = true;
                    break;
                }
            }
        }
    }

    placed.extend(deferred);
    placed
}
