pub mod output;

pub use output::{Output, render_heatmap, render_insight};
