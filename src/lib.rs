pub mod config;
pub mod detector;
pub mod feature;
pub mod frame;
pub mod image;
pub mod matcher;
pub mod my_types;
pub mod optical_flow;
pub mod pyramid;
pub mod region;
pub mod render;
pub mod seeder;
pub mod selection;
pub mod source;
pub mod tracker;

#[cfg(feature = "opencv")]
pub mod camera;
#[cfg(feature = "opencv")]
pub mod visualization;
