use libdetchar::error::DataError;
use libdetchar::features::{normalize, ChannelMatrix};
use libdetchar::lasso::{alpha_max, solve, LassoSettings};
use libdetchar::outlier::{find_outliers, remove_outliers};
use libdetchar::ranking::{cumulative_contributions, RankedChannel, Ranking, Severity};
use libdetchar::time_series::TimeSeries;
use ndarray::{Array1, Array2};
use proptest::prelude::*;
use proptest::test_runner::Config as ProptestConfig;

const DEFAULT_PROPTEST_CASES: u32 = 256;

fn proptest_cases() -> u32 {
    std::env::var("PROPTEST_CASES")
        .ok()
        .and_then(|raw| raw.parse::<u32>().ok())
        .unwrap_or(DEFAULT_PROPTEST_CASES)
}

fn ranked(idx: usize, coefficient: f64, flat: bool) -> RankedChannel {
    RankedChannel {
        name: format!("X1:CHAN_{idx:03}"),
        coefficient: if flat { 0.0 } else { coefficient },
        severity: if flat {
            Severity::Neutral
        } else {
            Severity::from_coefficient(coefficient)
        },
        order: idx,
        column: if flat { None } else { Some(idx) },
        plot: None,
    }
}

fn coefficient_strategy() -> impl Strategy<Value = f64> {
    prop_oneof![
        1 => Just(0.0),
        1 => prop::sample::select(vec![-0.5, 0.25, 0.5]),
        6 => -1.0f64..1.0,
    ]
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: proptest_cases(),
        .. ProptestConfig::default()
    })]

    #[test]
    fn outlier_removal_preserves_samples_and_terminates(
        values in prop::collection::vec(-100.0f64..100.0, 8..64),
        spikes in prop::collection::vec((0usize..64, 500.0f64..5000.0), 0..4),
        sigma in 2.0f64..4.0,
    ) {
        let mut values = values;
        for (idx, size) in spikes {
            let n = values.len();
            values[idx % n] += size;
        }
        let series = TimeSeries::new("X1:RANGE", 1000.0, 1.0 / 60.0, Array1::from(values));

        match remove_outliers(&series, sigma) {
            Ok(result) => {
                prop_assert_eq!(result.series.len(), series.len());
                prop_assert_eq!(&result.series.times, &series.times);
                if result.converged {
                    prop_assert!(find_outliers(result.series.values.view(), sigma).is_empty());
                }
                // Samples that were never flagged are untouched
                for idx in 0..series.len() {
                    if !result.replaced.contains(idx) {
                        prop_assert_eq!(result.series.values[idx], series.values[idx]);
                    }
                }
            }
            Err(DataError::Interpolation(_)) => (),
            Err(e) => prop_assert!(false, "unexpected error {e}"),
        }
    }

    #[test]
    fn normalized_columns_have_zero_mean_and_unit_variance(
        values in prop::collection::vec(-1000.0f64..1000.0, 2..128),
    ) {
        let view = Array1::from(values);
        prop_assume!(view.std(0.0) > 1.0);
        let normalized = normalize(view.view());
        prop_assert!(normalized.is_some());
        if let Some(normalized) = normalized {
            prop_assert!(normalized.mean().unwrap_or(f64::NAN).abs() < 1e-9);
            prop_assert!((normalized.std(0.0) - 1.0).abs() < 1e-9);
        }
    }

    #[test]
    fn ranking_is_sorted_permutation_with_maximal_useful_prefix(
        entries in prop::collection::vec((coefficient_strategy(), prop::bool::weighted(0.2)), 0..40),
        threshold in 0.0f64..0.8,
    ) {
        let channels: Vec<RankedChannel> = entries
            .iter()
            .enumerate()
            .map(|(idx, (c, flat))| ranked(idx, *c, *flat))
            .collect();
        let ranking = Ranking::from_channels(channels.clone(), threshold);

        let mut expected: Vec<&str> = channels.iter().map(|c| c.name.as_str()).collect();
        let mut found: Vec<&str> = ranking.channels.iter().map(|c| c.name.as_str()).collect();
        expected.sort_unstable();
        found.sort_unstable();
        prop_assert_eq!(expected, found);

        let active: Vec<&RankedChannel> = ranking.channels.iter().filter(|c| !c.is_flat()).collect();
        prop_assert!(ranking.channels[..active.len()].iter().all(|c| !c.is_flat()));
        for pair in active.windows(2) {
            prop_assert!(pair[0].coefficient.abs() >= pair[1].coefficient.abs());
            if pair[0].coefficient.abs() == pair[1].coefficient.abs() {
                prop_assert!(pair[0].order < pair[1].order);
            }
        }

        let n_useful = ranking.n_useful();
        prop_assert!(ranking.useful().iter().all(|c| !c.is_flat() && c.coefficient.abs() >= threshold));
        if let Some(next) = ranking.channels.get(n_useful) {
            prop_assert!(next.is_flat() || next.coefficient.abs() < threshold);
        }
    }

    #[test]
    fn cumulative_contributions_accumulate_in_rank_order(
        coefficients in prop::collection::vec(-1.0f64..1.0, 1..8),
        rows in 2usize..32,
        seed in prop::collection::vec(-3.0f64..3.0, 256),
    ) {
        let n_cols = coefficients.len();
        let data = Array2::from_shape_fn((rows, n_cols), |(r, c)| seed[(r * n_cols + c) % seed.len()]);
        let matrix = ChannelMatrix {
            names: (0..n_cols).map(|i| format!("X1:CHAN_{i:03}")).collect(),
            order: (0..n_cols).collect(),
            data,
        };
        let channels: Vec<RankedChannel> = coefficients
            .iter()
            .enumerate()
            .map(|(idx, c)| ranked(idx, *c, false))
            .collect();
        let ranking = Ranking::from_channels(channels, 0.0);
        let useful = ranking.useful();
        let cumulative = cumulative_contributions(useful, &matrix);
        prop_assert_eq!(cumulative.len(), useful.len());

        for (k, channel) in useful.iter().enumerate() {
            let column = channel.column.unwrap_or_default();
            let term = matrix.column(column).mapv(|v| v * channel.coefficient);
            let expected = if k == 0 { term } else { &cumulative[k - 1] + &term };
            for (a, b) in cumulative[k].iter().zip(expected.iter()) {
                prop_assert!((a - b).abs() < 1e-12);
            }
        }
    }

    #[test]
    fn penalty_above_alpha_max_selects_nothing(
        seed in prop::collection::vec(-3.0f64..3.0, 64),
        n_cols in 1usize..5,
        rows in 8usize..32,
    ) {
        let x = Array2::from_shape_fn((rows, n_cols), |(r, c)| seed[(r * 7 + c * 13) % seed.len()]);
        let y = Array1::from_shape_fn(rows, |r| seed[(r * 3 + 1) % seed.len()]);
        prop_assume!(y.dot(&y) > 0.0);
        let alpha = alpha_max(x.view(), y.view()) * 1.01 + 1e-12;
        let (coef, converged) = solve(x.view(), y.view(), alpha, &LassoSettings::default())
            .map_err(|e| TestCaseError::fail(e.to_string()))?;
        prop_assert!(converged);
        prop_assert_eq!(coef.len(), n_cols);
        prop_assert!(coef.iter().all(|c| *c == 0.0));
    }
}
