//! Support/resistance detection from resting ladder size.
//!
//! Ladder points from every snapshot are weighted by recency and summed per
//! exact price. Neighbouring prices within the cluster tolerance merge into
//! one cluster represented by its strongest price; a final strongest-first
//! pass keeps representatives at least one tolerance apart.

use std::cmp::Ordering;

use corelib::{LevelKind, LevelSet, PriceLevel};

use super::Feature;
use crate::config::LevelConfig;
use crate::window::FeatureWindow;

#[derive(Debug, Clone, Default)]
pub struct LevelDetector {
    config: LevelConfig,
}

#[derive(Debug, Clone, Copy)]
struct Point {
    price: f64,
    strength: f64,
    touches: u32,
}

impl LevelDetector {
    pub fn new(config: LevelConfig) -> Self {
        Self { config }
    }

    /// Sum of recency-weighted size per exact price, ascending by price.
    fn aggregate(&self, window: &FeatureWindow) -> Vec<Point> {
        let n = window.len();
        let mut raw: Vec<(f64, f64, usize)> = Vec::new();

        for (i, snapshot) in window.iter().enumerate() {
            let age = (n - 1 - i) as i32;
            let weight = self.config.recency_decay.powi(age);
            for level in snapshot.bids.iter().chain(snapshot.asks.iter()) {
                if level.price > 0.0 && level.price.is_finite() && level.size > 0.0 && level.size.is_finite() {
                    raw.push((level.price, level.size * weight, i));
                }
            }
        }

        raw.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.2.cmp(&b.2)));

        let mut points: Vec<Point> = Vec::new();
        let mut last_snapshot = usize::MAX;
        for (price, strength, i) in raw {
            match points.last_mut() {
                Some(p) if p.price == price => {
                    p.strength += strength;
                    if i != last_snapshot {
                        p.touches += 1;
                    }
                }
                _ => points.push(Point {
                    price,
                    strength,
                    touches: 1,
                }),
            }
            last_snapshot = i;
        }
        points
    }

    /// `min_strength`, raised for one-snapshot windows to a share of the
    /// strongest cluster.
    fn strength_floor(&self, snapshots: usize, clusters: &[Point]) -> f64 {
        if snapshots > 1 {
            return self.config.min_strength;
        }
        let strongest = clusters.iter().map(|p| p.strength).fold(0.0, f64::max);
        self.config
            .min_strength
            .max(strongest * self.config.single_snapshot_floor)
    }
}

/// Strongest first; equal strength resolves to the lower price.
fn by_strength(a: &Point, b: &Point) -> Ordering {
    b.strength
        .total_cmp(&a.strength)
        .then(a.price.total_cmp(&b.price))
}

fn cluster(points: &[Point], tolerance: f64) -> Vec<Point> {
    let mut reps = Vec::new();
    let mut start = 0;
    while start < points.len() {
        let anchor = points[start].price;
        let mut end = start + 1;
        while end < points.len() && points[end].price - anchor <= tolerance {
            end += 1;
        }

        let members = &points[start..end];
        if let Some(best) = members.iter().min_by(|a, b| by_strength(a, b)) {
            reps.push(Point {
                price: best.price,
                strength: members.iter().map(|p| p.strength).sum(),
                touches: members.iter().map(|p| p.touches).max().unwrap_or(0),
            });
        }
        start = end;
    }
    reps
}

impl Feature for LevelDetector {
    type Output = LevelSet;

    fn name(&self) -> &'static str {
        "levels"
    }

    fn derive(&self, window: &FeatureWindow) -> LevelSet {
        let Some(reference) = window.iter().rev().find_map(|s| s.mid()) else {
            return LevelSet::default();
        };
        let tolerance = reference * self.config.cluster_pct / 100.0;

        let points = self.aggregate(window);
        let clusters = cluster(&points, tolerance);
        let floor = self.strength_floor(window.len(), &clusters);
        let mut candidates: Vec<Point> = clusters.into_iter().filter(|p| p.strength >= floor).collect();
        candidates.sort_by(by_strength);

        let mut accepted: Vec<PriceLevel> = Vec::new();
        let (mut supports, mut resistances) = (0usize, 0usize);
        for c in candidates {
            if accepted.iter().any(|a| (a.price - c.price).abs() <= tolerance) {
                continue;
            }
            let kind = if c.price < reference {
                LevelKind::Support
            } else {
                LevelKind::Resistance
            };
            let count = match kind {
                LevelKind::Support => &mut supports,
                LevelKind::Resistance => &mut resistances,
            };
            if *count >= self.config.top_k {
                continue;
            }
            *count += 1;
            accepted.push(PriceLevel {
                price: c.price,
                strength: c.strength,
                kind,
                touches: c.touches,
            });
        }

        accepted.sort_by(|a, b| a.price.total_cmp(&b.price));
        LevelSet { levels: accepted }
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use super::*;
    use corelib::BookLevel;

    fn detector(cluster_pct: f64, top_k: usize) -> LevelDetector {
        LevelDetector::new(LevelConfig {
            cluster_pct,
            recency_decay: 0.5,
            top_k,
            min_strength: 0.0,
            single_snapshot_floor: 0.25,
        })
    }

    #[test]
    fn classifies_against_final_mid() {
        let w = window(vec![snapshot(0, 100.0)]);
        let set = detector(0.1, 3).derive(&w);
        let prices: Vec<(f64, LevelKind)> = set.levels.iter().map(|l| (l.price, l.kind)).collect();
        assert_eq!(
            prices,
            vec![
                (95.0, LevelKind::Support),
                (99.5, LevelKind::Support),
                (100.5, LevelKind::Resistance),
                (105.0, LevelKind::Resistance),
            ]
        );
    }

    #[test]
    fn nearby_prices_merge_into_strongest() {
        let mut s = snapshot(0, 100.0);
        s.bids = vec![BookLevel::new(99.5, 1.0), BookLevel::new(99.45, 5.0)];
        s.asks = vec![];
        // 0.1% of 100 = 0.1 tolerance
        let set = detector(0.1, 3).derive(&window(vec![s]));
        assert_eq!(set.len(), 1);
        assert_eq!(set.levels[0].price, 99.45);
        assert_eq!(set.levels[0].strength, 6.0);
    }

    #[test]
    fn recent_snapshots_weigh_more() {
        let mut old = snapshot(0, 100.0);
        old.bids = vec![BookLevel::new(90.0, 10.0)];
        old.asks = vec![];
        let mut new = snapshot(1, 100.0);
        new.bids = vec![BookLevel::new(95.0, 6.0)];
        new.asks = vec![];

        let set = detector(0.1, 1).derive(&window(vec![old, new]));
        // 90 weighs 10 * 0.5 = 5 < 6
        assert_eq!(set.levels.len(), 1);
        assert_eq!(set.levels[0].price, 95.0);
    }

    #[test]
    fn keeps_top_k_per_side_and_counts_touches() {
        let w = window(vec![snapshot(0, 100.0), snapshot(1, 100.0)]);
        let set = detector(0.1, 1).derive(&w);
        assert_eq!(set.supports().count(), 1);
        assert_eq!(set.resistances().count(), 1);
        assert!(set.levels.iter().all(|l| l.touches == 2));
    }

    #[test]
    fn strength_floor_drops_weak_levels() {
        let mut d = detector(0.1, 3);
        d.config.min_strength = 3.0;
        let set = d.derive(&window(vec![snapshot(0, 100.0)]));
        let prices: Vec<f64> = set.levels.iter().map(|l| l.price).collect();
        assert_eq!(prices, vec![95.0]);
    }

    #[test]
    fn single_snapshot_drops_clusters_far_below_the_strongest() {
        let mut d = detector(0.1, 3);
        d.config.single_snapshot_floor = 0.5;

        // strengths 4 (95), 1 (99.5), 1 (100.5), 2 (105): floor is 2
        let lone = d.derive(&window(vec![snapshot(0, 100.0)]));
        let prices: Vec<f64> = lone.levels.iter().map(|l| l.price).collect();
        assert_eq!(prices, vec![95.0, 105.0]);

        let history = d.derive(&window(vec![snapshot(0, 100.0), snapshot(1, 100.0)]));
        assert_eq!(history.levels.len(), 4);
    }

    #[test]
    fn no_valid_mid_means_no_levels() {
        let mut s = snapshot(0, 100.0);
        s.best_bid.price = 0.0;
        assert!(detector(0.1, 3).derive(&window(vec![s])).is_empty());
    }
}
