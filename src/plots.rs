use plotters::coord::Shift;
use plotters::prelude::*;

use crate::error::{Error, Result};

fn plot_error<E: std::fmt::Display>(e: E) -> Error {
    Error::Plot(e.to_string())
}

/// Draws `(iteration, rmse)` pairs on a log-scaled y axis.
pub fn plot_loss_history<DB>(
    history: &[(usize, f64)],
    label: &str,
    drawing_area: &DrawingArea<DB, Shift>,
) -> Result<()>
where
    DB: DrawingBackend,
    <DB as DrawingBackend>::ErrorType: 'static,
{
    drawing_area.fill(&WHITE).map_err(plot_error)?;

    let max_iteration = history.iter().map(|&(i, _)| i).max().unwrap_or(1);

    let (min_loss, max_loss) = history
        .iter()
        .map(|&(_, l)| l)
        .filter(|l| l.is_finite() && *l > 0.)
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), l| {
            (lo.min(l), hi.max(l))
        });

    let (min_loss, max_loss) = if min_loss <= max_loss {
        (min_loss, max_loss * 1.1)
    } else {
        (1e-3, 1.)
    };

    let mut chart_builder = ChartBuilder::on(drawing_area);

    let mut chart_context = chart_builder
        .caption(label, ("Arial", 20))
        .set_all_label_area_size(70)
        .margin(50)
        .build_cartesian_2d(0..max_iteration, (min_loss..max_loss).log_scale())
        .map_err(plot_error)?;

    chart_context
        .configure_mesh()
        .x_labels(10)
        .x_desc("Iteration")
        .y_labels(10)
        .y_desc(label)
        .y_label_formatter(&|y| format!("{:.1e}", y))
        .draw()
        .map_err(plot_error)?;

    let losses = LineSeries::new(
        history
            .iter()
            .filter(|(_, l)| l.is_finite() && *l > 0.)
            .map(|&(i, l)| (i, l)),
        BLUE.filled(),
    );

    chart_context.draw_series(losses).map_err(plot_error)?;

    Ok(())
}

pub fn save_loss_plot<P: AsRef<std::path::Path>>(history: &[(usize, f64)], path: P) -> Result<()> {
    let backend = SVGBackend::new(path.as_ref(), (1024, 768)).into_drawing_area();

    plot_loss_history(history, "RMSE", &backend)?;

    backend.present().map_err(plot_error)?;

    log::info!("loss plot written to {}", path.as_ref().display());

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_loss_curve_to_svg() {
        let mut svg = String::new();

        {
            let backend = SVGBackend::with_string(&mut svg, (640, 480)).into_drawing_area();
            let history = [(1000, 3.), (2000, 1.), (3000, 0.5), (4000, 0.)];

            plot_loss_history(&history, "RMSE", &backend).unwrap();
            backend.present().unwrap();
        }

        assert!(svg.contains("<svg"));
        assert!(svg.contains("polyline"));
    }
}
