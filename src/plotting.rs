use crate::error::{plot_error, Result};
use crate::linkage::Linkage;
use plotters::coord::types::RangedCoordf64;
use plotters::coord::Shift;
use plotters::prelude::*;
use std::path::Path;

/// Rendering options for [`plot`]
#[derive(Debug, Clone)]
pub struct PlotOptions {
    pub title: String,
    pub size: (u32, u32),
    /// Leaf names indexed by sample; sample indices are used when absent
    pub labels: Option<Vec<String>>,
    pub y_desc: String,
    /// Links at or below this height use `link_color`, higher ones `above_threshold_color`
    pub color_threshold: Option<f64>,
    pub link_color: RGBColor,
    pub above_threshold_color: RGBColor,
}

impl Default for PlotOptions {
    fn default() -> Self {
        PlotOptions {
            title: "Hierarchical Clustering Dendrogram".to_string(),
            size: (1200, 800),
            labels: None,
            y_desc: "Distance".to_string(),
            color_threshold: None,
            link_color: BLUE,
            above_threshold_color: BLACK,
        }
    }
}

/// Coordinates of every node: leaves evenly spaced in dendrogram order, merges
/// centred over their children at the merge distance.
#[derive(Debug, Clone, PartialEq)]
pub struct DendrogramLayout {
    /// Leaf sample at each x position
    pub order: Vec<usize>,
    /// x position of every node id
    pub x: Vec<f64>,
    /// Height of every node id, zero for leaves
    pub height: Vec<f64>,
}

impl DendrogramLayout {
    pub fn new(linkage: &Linkage) -> Self {
        let n_samples = linkage.n_samples();
        let order = linkage.leaf_order();

        let mut x = vec![0.0; n_samples + linkage.len()];
        let mut height = vec![0.0; n_samples + linkage.len()];
        for (position, &leaf) in order.iter().enumerate() {
            x[leaf] = position as f64;
        }
        for (i, merge) in linkage.rows().iter().enumerate() {
            x[n_samples + i] = (x[merge.left] + x[merge.right]) / 2.0;
            height[n_samples + i] = merge.distance;
        }

        DendrogramLayout { order, x, height }
    }

    pub fn max_height(&self) -> f64 {
        self.height.iter().copied().fold(0.0, f64::max)
    }
}

/// Render the dendrogram of `linkage` to an image file.
///
/// `.svg` paths are written as SVG, anything else as a bitmap (PNG).
pub fn plot<P: AsRef<Path>>(linkage: &Linkage, output_path: P, options: &PlotOptions) -> Result<()> {
    let path = output_path.as_ref();
    let is_svg = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("svg"));

    if is_svg {
        draw(SVGBackend::new(path, options.size).into_drawing_area(), linkage, options)
    } else {
        draw(BitMapBackend::new(path, options.size).into_drawing_area(), linkage, options)
    }
}

fn draw<DB: DrawingBackend>(
    root_area: DrawingArea<DB, Shift>,
    linkage: &Linkage,
    options: &PlotOptions,
) -> Result<()>
where
    DB::ErrorType: 'static,
{
    let layout = DendrogramLayout::new(linkage);
    let n_samples = linkage.n_samples();
    let max_height = match layout.max_height() {
        h if h > 0.0 => h,
        _ => 1.0,
    };

    let leaf_name = |leaf: usize| match &options.labels {
        Some(labels) => labels.get(leaf).cloned().unwrap_or_else(|| leaf.to_string()),
        None => leaf.to_string(),
    };

    root_area.fill(&WHITE).map_err(plot_error)?;

    let mut chart = ChartBuilder::on(&root_area)
        .caption(&options.title, ("sans-serif", 40).into_font())
        .margin(20)
        .x_label_area_size(150)
        .y_label_area_size(60)
        .build_cartesian_2d(-0.5..(n_samples as f64 - 0.5), 0.0..(max_height * 1.1))
        .map_err(plot_error)?;

    chart
        .configure_mesh()
        .disable_x_mesh()
        .y_desc(options.y_desc.as_str())
        .x_labels(n_samples)
        .x_label_formatter(&|x| {
            let position = x.round();
            if (x - position).abs() > 1e-6 || position < 0.0 {
                return String::new();
            }
            layout
                .order
                .get(position as usize)
                .map(|&leaf| leaf_name(leaf))
                .unwrap_or_default()
        })
        .draw()
        .map_err(plot_error)?;

    for (i, merge) in linkage.rows().iter().enumerate() {
        draw_link(&mut chart, &layout, n_samples + i, merge.left, merge.right, options)?;
    }

    root_area.present().map_err(plot_error)?;
    log::debug!("Rendered dendrogram with {} leaves", n_samples);

    Ok(())
}

/// Color of a link drawn at `height`
fn link_color(options: &PlotOptions, height: f64) -> RGBColor {
    match options.color_threshold {
        Some(threshold) if height > threshold => options.above_threshold_color,
        _ => options.link_color,
    }
}

/// Draw the bracket joining two children at their parent's height
fn draw_link<DB: DrawingBackend>(
    chart: &mut ChartContext<'_, DB, Cartesian2d<RangedCoordf64, RangedCoordf64>>,
    layout: &DendrogramLayout,
    parent: usize,
    left: usize,
    right: usize,
    options: &PlotOptions,
) -> Result<()>
where
    DB::ErrorType: 'static,
{
    let parent_height = layout.height[parent];
    let color = link_color(options, parent_height);

    chart
        .draw_series(LineSeries::new(
            vec![
                (layout.x[left], layout.height[left]),
                (layout.x[left], parent_height),
                (layout.x[right], parent_height),
                (layout.x[right], layout.height[right]),
            ],
            &color,
        ))
        .map_err(plot_error)?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clustering::FittedModel;
    use std::fs;
    use tempfile::TempDir;

    fn linkage() -> Linkage {
        let model = FittedModel::new(
            vec![[0, 1], [2, 5], [3, 4], [6, 7]],
            vec![0; 5],
            vec![1.0, 2.0, 3.0, 4.0],
        );
        Linkage::build(&model).unwrap()
    }

    #[test]
    fn layout_follows_leaf_order() {
        let layout = DendrogramLayout::new(&linkage());

        assert_eq!(layout.order, vec![2, 0, 1, 3, 4]);
        assert_eq!(&layout.x[..5], &[1.0, 2.0, 0.0, 3.0, 4.0]);
        // (0, 1) sits over positions 1 and 2, (2, (0, 1)) over 0 and 1.5
        assert_eq!(layout.x[5], 1.5);
        assert_eq!(layout.x[6], 0.75);
        assert_eq!(layout.x[7], 3.5);
        assert_eq!(layout.x[8], 2.125);
    }

    #[test]
    fn layout_heights() {
        let layout = DendrogramLayout::new(&linkage());

        assert!(layout.height[..5].iter().all(|&h| h == 0.0));
        assert_eq!(&layout.height[5..], &[1.0, 2.0, 3.0, 4.0]);
        assert_eq!(layout.max_height(), 4.0);
    }

    #[test]
    fn default_options() {
        let options = PlotOptions::default();
        assert_eq!(options.size, (1200, 800));
        assert!(options.labels.is_none());
        assert!(options.color_threshold.is_none());
    }

    #[test]
    fn link_color_splits_at_threshold() {
        let options = PlotOptions {
            color_threshold: Some(2.5),
            link_color: RED,
            above_threshold_color: GREEN,
            ..PlotOptions::default()
        };

        assert_eq!(link_color(&options, 1.0).rgb(), RED.rgb());
        assert_eq!(link_color(&options, 2.5).rgb(), RED.rgb());
        assert_eq!(link_color(&options, 4.0).rgb(), GREEN.rgb());

        let unthresholded = PlotOptions::default();
        assert_eq!(link_color(&unthresholded, 100.0).rgb(), BLUE.rgb());
    }

    #[test]
    fn plot_writes_svg() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("tree.svg");
        let options = PlotOptions {
            labels: Some(["A", "B", "C", "D", "E"].iter().map(|s| s.to_string()).collect()),
            color_threshold: Some(2.5),
            ..PlotOptions::default()
        };

        plot(&linkage(), &path, &options).unwrap();

        let svg = fs::read_to_string(&path).unwrap();
        assert!(svg.contains("<svg"));
        assert!(svg.contains("<polyline"));
    }

    #[test]
    fn plot_writes_png() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("tree.png");

        plot(&linkage(), &path, &PlotOptions::default()).unwrap();

        let png = fs::read(&path).unwrap();
        assert!(png.starts_with(&[0x89, b'P', b'N', b'G']));
    }
}
