use serde::Serialize;

const FNV_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

const COUNTRIES: [&str; 6] = ["US", "KR", "JP", "IN", "BR", "GB"];

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CountryShare {
    pub country: &'static str,
    pub percent: f64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaceholderPanel {
    pub placeholder: bool,
    pub superchat_earnings: u64,
    pub live_viewers: u64,
    pub audience: Vec<CountryShare>,
}

/// Placeholder panel figures with no real data source. Deterministic per
/// seed, including across builds.
pub struct MockDataGenerator {
    state: u64,
}

impl MockDataGenerator {
    pub fn seeded(seed: &str) -> Self {
        Self {
            state: fnv1a(seed.as_bytes()),
        }
    }

    // splitmix64
    fn next(&mut self) -> u64 {
        self.state = self.state.wrapping_add(0x9E37_79B9_7F4A_7C15);
        let mut z = self.state;
        z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
        z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
        z ^ (z >> 31)
    }

    fn between(&mut self, low: u64, high: u64) -> u64 {
        low + self.next() % (high - low + 1)
    }

    pub fn superchat_earnings(&mut self) -> u64 {
        self.between(10_000, 500_000)
    }

    pub fn live_viewers(&mut self) -> u64 {
        self.between(100, 10_000)
    }

    /// Shares summing to 100.
    pub fn audience(&mut self) -> Vec<CountryShare> {
        let weights: Vec<u64> = COUNTRIES.iter().map(|_| self.between(1, 100)).collect();
        let total: u64 = weights.iter().sum();
        COUNTRIES
            .iter()
            .zip(weights)
            .map(|(country, weight)| CountryShare {
                country: *country,
                percent: weight as f64 * 100.0 / total as f64,
            })
            .collect()
    }

    pub fn panel(&mut self) -> PlaceholderPanel {
        PlaceholderPanel {
            placeholder: true,
            superchat_earnings: self.superchat_earnings(),
            live_viewers: self.live_viewers(),
            audience: self.audience(),
        }
    }
}

fn fnv1a(bytes: &[u8]) -> u64 {
    bytes
        .iter()
        .fold(FNV_OFFSET, |hash, byte| (hash ^ u64::from(*byte)).wrapping_mul(FNV_PRIME))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_seed_same_values() {
        let a = MockDataGenerator::seeded("UC1").panel();
        let b = MockDataGenerator::seeded("UC1").panel();
        assert_eq!(a.superchat_earnings, b.superchat_earnings);
        assert_eq!(a.live_viewers, b.live_viewers);
        assert!(a.placeholder);
    }

    #[test]
    fn seed_is_fixed_across_builds() {
        assert_eq!(fnv1a(b"UC1"), 0x6224_fc19_db56_fae8);
        assert_eq!(MockDataGenerator::seeded("UC1").superchat_earnings(), 220_187);
    }

    #[test]
    fn values_stay_in_range() {
        let mut generator = MockDataGenerator::seeded("range");
        for _ in 0..100 {
            let viewers = generator.live_viewers();
            assert!((100..=10_000).contains(&viewers));
        }
        let total: f64 = generator.audience().iter().map(|share| share.percent).sum();
        assert!((total - 100.0).abs() < 1e-6);
    }
}
