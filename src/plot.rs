#![allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]

use crate::results::{self, Report, GEO_MEAN};
use color_eyre::eyre;
use std::path::{Path, PathBuf};

/// Top of the y axis; taller bars are clipped and annotated.
pub const Y_MAX: f64 = 2.5;

const BAR_COLORS: [plotters::style::RGBColor; 3] = [
    plotters::style::RGBColor(0x87, 0xCE, 0xFA),
    plotters::style::RGBColor(0xDB, 0xAD, 0x3D),
    plotters::style::RGBColor(0x18, 0x73, 0xBA),
];

/// Draw one panel per report group with a bar per row, to `path` as png.
///
/// Returns the path of the image.
pub fn bar_chart(report: &Report, path: impl AsRef<Path>, y_label: &str) -> eyre::Result<PathBuf> {
    use plotters::prelude::*;

    let groups = report.groups();
    if groups.is_empty() {
        eyre::bail!("nothing to plot");
    }

    let png = path.as_ref().with_extension("png");
    let num_bars = groups.values().map(Vec::len).max().unwrap_or(1);
    let size = ((groups.len() * (num_bars * 40 + 60)).max(400) as u32, 500);
    let backend = BitMapBackend::new(&png, size);
    let root_area = backend.into_drawing_area();
    root_area.fill(&WHITE)?;

    let font_size = 14;
    let panels = root_area.split_evenly((1, groups.len()));
    for (idx, (panel, (group, bars))) in panels.iter().zip(groups.iter()).enumerate() {
        let mut chart_ctx = ChartBuilder::on(panel)
            .caption(*group, ("sans-serif", font_size))
            .set_label_area_size(LabelAreaPosition::Left, if idx == 0 { 50 } else { 0 })
            .set_label_area_size(LabelAreaPosition::Bottom, 100)
            .margin(5)
            .build_cartesian_2d((0..bars.len()).into_segmented(), 0.0..Y_MAX)?;

        let labels: Vec<&str> = bars.iter().map(|(label, _)| *label).collect();
        chart_ctx
            .configure_mesh()
            .disable_x_mesh()
            .y_desc(if idx == 0 { y_label } else { "" })
            .x_labels(bars.len())
            .x_label_formatter(&|x| match x {
                SegmentValue::CenterOf(i) => labels.get(*i).copied().unwrap_or_default().to_string(),
                _ => String::new(),
            })
            .x_label_style(
                ("sans-serif", font_size)
                    .into_font()
                    .transform(FontTransform::Rotate90),
            )
            .draw()?;

        chart_ctx.draw_series(bars.iter().enumerate().map(|(i, (label, value))| {
            let color = if *label == GEO_MEAN {
                BAR_COLORS[2]
            } else {
                BAR_COLORS[i % 2]
            };
            let height = if value.is_finite() { value.clamp(0.0, Y_MAX) } else { 0.0 };
            let mut bar = Rectangle::new(
                [
                    (SegmentValue::Exact(i), 0.0),
                    (SegmentValue::Exact(i + 1), height),
                ],
                color.filled(),
            );
            bar.set_margin(0, 0, 5, 5);
            bar
        }))?;

        chart_ctx.draw_series(
            bars.iter()
                .enumerate()
                .filter(|(_, (_, value))| *value > Y_MAX)
                .map(|(i, (_, value))| {
                    Text::new(
                        format!("{value:.2}"),
                        (SegmentValue::CenterOf(i), Y_MAX * 0.95),
                        ("sans-serif", font_size).into_font(),
                    )
                }),
        )?;
    }

    root_area.present()?;
    Ok(png.clone())
}

/// Draw the geo-mean of every report group into `{stem}_geo_mean.png` next to `path`.
pub fn geo_mean_chart(
    report: &Report,
    path: impl AsRef<Path>,
    y_label: &str,
) -> eyre::Result<PathBuf> {
    let path = path.as_ref();
    let stem = path
        .file_stem()
        .map(|stem| stem.to_string_lossy().to_string())
        .unwrap_or_default();
    let summary = results::geo_mean_report(report);
    bar_chart(&summary, path.with_file_name(format!("{stem}_geo_mean.png")), y_label)
}
