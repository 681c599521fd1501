//! Selecting which moving-mesh vertices take part in an ICP iteration.

use std::collections::BTreeMap;

use nalgebra::Vector3;
use rand::seq::index;
use rand::Rng;

use super::SamplingStrategy;

/// Number of samples drawn from `num_vertices` vertices: `max_points`
/// clamped to `num_vertices - 1`, but at least one.
pub fn sample_count(num_vertices: usize, max_points: usize) -> usize {
    max_points
        .min(num_vertices.saturating_sub(1))
        .max(1)
        .min(num_vertices)
}

/// Pick vertex indices according to `strategy`.
///
/// Indices are distinct. `normals` supplies one normal per vertex; the
/// normal-space strategies bucket vertices by their exact normal.
pub fn sample_indices<R: Rng + ?Sized>(
    normals: &[Vector3<f64>],
    strategy: SamplingStrategy,
    max_points: usize,
    rng: &mut R,
) -> Vec<usize> {
    let count = sample_count(normals.len(), max_points);
    match strategy {
        SamplingStrategy::RandomPoint => index::sample(rng, normals.len(), count).into_vec(),
        SamplingStrategy::Normal => normal_space_sample(normals, count, rng),
        SamplingStrategy::StratifiedNormal => stratified_normal_sample(normals, count),
    }
}

/// Buckets of vertex indices sharing a normal, in a deterministic order.
fn normal_buckets(normals: &[Vector3<f64>]) -> Vec<Vec<usize>> {
    let mut buckets: BTreeMap<[u64; 3], Vec<usize>> = BTreeMap::new();
    for (i, n) in normals.iter().enumerate() {
        // + 0.0 folds -0.0 into 0.0
        let key = [(n.x + 0.0).to_bits(), (n.y + 0.0).to_bits(), (n.z + 0.0).to_bits()];
        buckets.entry(key).or_default().push(i);
    }
    buckets.into_values().collect()
}

fn normal_space_sample<R: Rng + ?Sized>(
    normals: &[Vector3<f64>],
    count: usize,
    rng: &mut R,
) -> Vec<usize> {
    let mut buckets = normal_buckets(normals);
    let mut samples = Vec::with_capacity(count);

    while samples.len() < count && !buckets.is_empty() {
        let b = rng.gen_range(0..buckets.len());
        let bucket = &mut buckets[b];
        let i = rng.gen_range(0..bucket.len());
        samples.push(bucket.swap_remove(i));
        if bucket.is_empty() {
            buckets.swap_remove(b);
        }
    }
    samples
}

fn stratified_normal_sample(normals: &[Vector3<f64>], count: usize) -> Vec<usize> {
    let buckets = normal_buckets(normals);
    let mut samples = Vec::with_capacity(count);

    // Round r takes the r-th vertex of every bucket that still has one
    let mut round = 0;
    while samples.len() < count {
        let before = samples.len();
        for bucket in &buckets {
            if samples.len() == count {
                break;
            }
            if let Some(&v) = bucket.get(round) {
                samples.push(v);
            }
        }
        if samples.len() == before {
            break;
        }
        round += 1;
    }
    samples
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::collections::HashSet;

    /// Ten vertices facing +Z, two facing +X, one facing -Y.
    fn skewed_normals() -> Vec<Vector3<f64>> {
        let mut normals = vec![Vector3::z(); 10];
        normals.extend([Vector3::x(), Vector3::x(), -Vector3::y()]);
        normals
    }

    #[test]
    fn test_sample_count_clamps() {
        assert_eq!(sample_count(100, 1000), 99);
        assert_eq!(sample_count(100, 10), 10);
        assert_eq!(sample_count(1, 1000), 1);
        assert_eq!(sample_count(5, 0), 1);
        assert_eq!(sample_count(0, 10), 0);
    }

    #[test]
    fn test_random_sampling_is_distinct_and_seeded() {
        let normals = vec![Vector3::z(); 50];
        let strategy = SamplingStrategy::RandomPoint;
        let a = sample_indices(&normals, strategy, 20, &mut StdRng::seed_from_u64(3));
        let b = sample_indices(&normals, strategy, 20, &mut StdRng::seed_from_u64(3));
        assert_eq!(a, b);
        assert_eq!(a.len(), 20);
        assert_eq!(a.iter().collect::<HashSet<_>>().len(), 20);
        assert!(a.iter().all(|&i| i < 50));
    }

    #[test]
    fn test_normal_sampling_covers_rare_normals() {
        let normals = skewed_normals();
        let mut rng = StdRng::seed_from_u64(9);
        // Three buckets, so rare normals are drawn far more often than 3/13
        let mut rare = 0;
        for _ in 0..200 {
            let s = sample_indices(&normals, SamplingStrategy::Normal, 3, &mut rng);
            assert_eq!(s.len(), 3);
            rare += s.iter().filter(|&&i| i >= 10).count();
        }
        assert!(rare > 250, "rare samples: {rare}");
    }

    #[test]
    fn test_stratified_sampling_visits_every_bucket_first() {
        let normals = skewed_normals();
        let mut rng = StdRng::seed_from_u64(0);
        let s = sample_indices(&normals, SamplingStrategy::StratifiedNormal, 3, &mut rng);
        let mut kinds: Vec<_> = s.iter().map(|&i| normals[i]).collect();
        kinds.dedup();
        assert_eq!(kinds.len(), 3);

        // Second round only has +Z and +X left
        let s = sample_indices(&normals, SamplingStrategy::StratifiedNormal, 5, &mut rng);
        assert_eq!(s.len(), 5);
        assert_eq!(s.iter().collect::<HashSet<_>>().len(), 5);
    }

    #[test]
    fn test_stratified_sampling_fills_quota() {
        let normals = skewed_normals();
        let mut rng = StdRng::seed_from_u64(0);
        let s = sample_indices(&normals, SamplingStrategy::StratifiedNormal, 1000, &mut rng);
        assert_eq!(s.len(), normals.len() - 1);
    }
}
