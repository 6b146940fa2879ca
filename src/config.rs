use clap::ValueEnum;

use crate::seeder::SeedStrategy;
use crate::selection::Gesture;

/// What the user designates on the video.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum Item {
    /// a single clicked pixel
    Pixel,
    /// a rectangular zone, optionally meshed with a grid of points
    Zone,
    /// corners detected inside a rectangular zone
    Poi,
    /// reference photographs matched against the live video
    Limits,
}

#[derive(Debug, Clone, clap::Parser)]
pub struct Config {
    #[clap(long, value_enum, default_value = "poi")]
    pub item: Item,

    /// Seed a grid of points in zone mode
    #[clap(long)]
    pub mesh: bool,

    #[clap(long, default_value = "10")]
    pub grid_size: usize,

    /// Maximum number of points of interest
    #[clap(long, default_value = "10")]
    pub n_poi: usize,

    #[clap(long, default_value = "0.01")]
    pub quality_level: f64,

    #[clap(long, default_value = "10")]
    pub min_distance: f64,

    /// Seed points of interest without tracking them
    #[clap(long)]
    pub seed_only: bool,

    /// Selection gesture, defaults to `point` for pixel mode and `click` otherwise
    #[clap(long, value_enum)]
    pub gesture: Option<Gesture>,

    #[clap(long, default_value = "15")]
    pub lk_win_size: usize,

    #[clap(long, default_value = "2")]
    pub lk_levels: usize,

    #[clap(long, default_value = "10")]
    pub lk_iters: usize,

    #[clap(long, default_value = "0.03")]
    pub lk_term: f64,

    #[clap(long, default_value = "1e-4")]
    pub lk_min_eig: f64,

    /// Also reject estimates whose residual exceeds this value
    #[clap(long)]
    pub max_error: Option<f64>,

    /// Past positions kept per point for drawing trails
    #[clap(long, default_value = "1")]
    pub trail_length: usize,

    #[clap(long, default_value = "0")]
    pub seed: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            item: Item::Poi,
            mesh: false,
            grid_size: 10,
            n_poi: 10,
            quality_level: 0.01,
            min_distance: 10.,
            seed_only: false,
            gesture: None,
            lk_win_size: 15,
            lk_levels: 2,
            lk_iters: 10,
            lk_term: 0.03,
            lk_min_eig: 1e-4,
            max_error: None,
            trail_length: 1,
            seed: 0,
        }
    }
}

impl Config {
    pub fn gesture(&self) -> Gesture {
        match (self.gesture, self.item) {
            (Some(gesture), _) => gesture,
            (None, Item::Pixel) => Gesture::Point,
            (None, _) => Gesture::Click,
        }
    }

    pub fn seed_strategy(&self) -> SeedStrategy {
        match self.item {
            Item::Pixel | Item::Limits => SeedStrategy::Single,
            Item::Zone if self.mesh => SeedStrategy::Grid {
                size: self.grid_size,
            },
            Item::Zone => SeedStrategy::Outline,
            Item::Poi => SeedStrategy::Features {
                max_points: self.n_poi,
                quality_level: self.quality_level,
                min_distance: self.min_distance,
            },
        }
    }

    /// Whether seeded points are re-estimated every frame
    pub fn tracks(&self) -> bool {
        !(self.item == Item::Poi && self.seed_only)
    }
}
