use crate::domain::Review;
use serde::Serialize;

const LENGTH_BINS: usize = 10;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LengthBin {
    pub from: usize,
    pub to: usize,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReviewAnalytics {
    pub total: usize,
    pub rated: usize,
    /// Reviews per star, index 0 is one star.
    pub rating_distribution: [usize; 5],
    pub average_rating: Option<f64>,
    pub length_histogram: Vec<LengthBin>,
}

impl ReviewAnalytics {
    pub fn from_reviews(reviews: &[Review]) -> Self {
        let ratings: Vec<f64> = reviews
            .iter()
            .filter_map(Review::numeric_rating)
            .filter(|r| (1.0..=5.0).contains(r))
            .collect();

        let mut rating_distribution = [0; 5];
        for rating in &ratings {
            let star = rating.round().clamp(1.0, 5.0) as usize;
            rating_distribution[star - 1] += 1;
        }

        let average_rating = if ratings.is_empty() {
            None
        } else {
            Some(ratings.iter().sum::<f64>() / ratings.len() as f64)
        };

        let lengths: Vec<usize> = reviews.iter().map(|r| r.text.chars().count()).collect();

        Self {
            total: reviews.len(),
            rated: ratings.len(),
            rating_distribution,
            average_rating,
            length_histogram: length_histogram(&lengths),
        }
    }
}

fn length_histogram(lengths: &[usize]) -> Vec<LengthBin> {
    let (Some(&min), Some(&max)) = (lengths.iter().min(), lengths.iter().max()) else {
        return Vec::new();
    };

    let width = ((max - min) / LENGTH_BINS + 1).max(1);
    let mut bins: Vec<LengthBin> = (0..LENGTH_BINS)
        .map(|i| LengthBin {
            from: min + i * width,
            to: min + (i + 1) * width - 1,
            count: 0,
        })
        .collect();

    for &len in lengths {
        let index = ((len - min) / width).min(LENGTH_BINS - 1);
        bins[index].count += 1;
    }

    bins
}
