// Criterion settings shared by every bench target.

use criterion::Criterion;
use std::time::Duration;

pub fn get_criterion() -> Criterion {
    Criterion::default()
        .measurement_time(Duration::from_secs(3))
        .warm_up_time(Duration::from_secs(1))
        .sample_size(50)
}
