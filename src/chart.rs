use std::fmt::Write;

use crate::telemetry::Sample;

const MARGIN_LEFT: f64 = 90.0;
const MARGIN_RIGHT: f64 = 30.0;
const MARGIN_TOP: f64 = 30.0;
const MARGIN_BOTTOM: f64 = 80.0;

/// Render fitness samples as an SVG scatter plot.
///
/// The y axis is fixed to [0, 1]; the x axis spans zero to the latest
/// tournament count.
pub fn render_svg(samples: &[Sample], width: u32, height: u32) -> String {
    let (w, h) = (width as f64, height as f64);
    let plot_w = (w - MARGIN_LEFT - MARGIN_RIGHT).max(1.0);
    let plot_h = (h - MARGIN_TOP - MARGIN_BOTTOM).max(1.0);
    let x_max = samples.last().map(|s| s.iteration).unwrap_or(0).max(1) as f64;

    let x_of = |iteration: u64| MARGIN_LEFT + iteration as f64 / x_max * plot_w;
    let y_of = |fitness: f64| MARGIN_TOP + (1.0 - fitness.clamp(0.0, 1.0)) * plot_h;

    let mut svg = String::new();
    let _ = writeln!(
        svg,
        r#"<svg xmlns="http://www.w3.org/2000/svg" width="{width}" height="{height}" viewBox="0 0 {width} {height}">"#
    );
    let _ = writeln!(svg, r#"<rect width="100%" height="100%" fill="white"/>"#);

    // Horizontal grid and y labels.
    for tick in 0..=4 {
        let fitness = tick as f64 / 4.0;
        let y = y_of(fitness);
        let _ = writeln!(
            svg,
            r##"<line x1="{MARGIN_LEFT}" y1="{y:.1}" x2="{:.1}" y2="{y:.1}" stroke="#ddd"/>"##,
            MARGIN_LEFT + plot_w
        );
        let _ = writeln!(
            svg,
            r#"<text x="{:.1}" y="{:.1}" font-size="14" text-anchor="end">{fitness:.2}</text>"#,
            MARGIN_LEFT - 8.0,
            y + 5.0
        );
    }

    // X labels at the ends of the axis.
    let baseline = MARGIN_TOP + plot_h;
    let _ = writeln!(
        svg,
        r#"<text x="{MARGIN_LEFT}" y="{:.1}" font-size="14" text-anchor="middle">0</text>"#,
        baseline + 20.0
    );
    let _ = writeln!(
        svg,
        r#"<text x="{:.1}" y="{:.1}" font-size="14" text-anchor="end">{}</text>"#,
        MARGIN_LEFT + plot_w,
        baseline + 20.0,
        x_max as u64
    );

    // Axes.
    let _ = writeln!(
        svg,
        r#"<polyline points="{MARGIN_LEFT},{MARGIN_TOP} {MARGIN_LEFT},{baseline:.1} {:.1},{baseline:.1}" fill="none" stroke="black"/>"#,
        MARGIN_LEFT + plot_w
    );
    let _ = writeln!(
        svg,
        r#"<text x="{:.1}" y="{:.1}" font-size="24" text-anchor="middle">Tournaments</text>"#,
        MARGIN_LEFT + plot_w / 2.0,
        h - 20.0
    );
    let _ = writeln!(
        svg,
        r#"<text x="24" y="{:.1}" font-size="24" text-anchor="middle" transform="rotate(-90 24 {:.1})">Fitness</text>"#,
        MARGIN_TOP + plot_h / 2.0,
        MARGIN_TOP + plot_h / 2.0
    );

    for sample in samples {
        let _ = writeln!(
            svg,
            r##"<circle cx="{:.1}" cy="{:.1}" r="3" fill="#1f77b4"/>"##,
            x_of(sample.iteration),
            y_of(sample.fitness)
        );
    }

    svg.push_str("</svg>\n");
    svg
}
