//! Value ranges and diverging colour scales for delta heatmaps.

pub const RED: &str = "rgb(255,0,0)";
pub const DARK_RED: &str = "rgb(240,0,0)";
pub const WHITE: &str = "rgb(255,255,255)";
pub const DARK_GREEN: &str = "rgb(0,240,0)";
pub const GREEN: &str = "rgb(0,255,0)";

/// Floors `x` to a multiple of `to_value`, e.g. `floor_to(1.27, 0.05) == 1.25`.
pub fn floor_to(x: f64, to_value: f64) -> f64 {
    (x / to_value).floor() * to_value
}

/// Ceils `x` to a multiple of `to_value`, e.g. `ceil_to(1.27, 0.05) == 1.30`.
pub fn ceil_to(x: f64, to_value: f64) -> f64 {
    (x / to_value).ceil() * to_value
}

/// Min and max of `values`, widened so `zmid` is always inside the range, and
/// optionally floored/ceiled to a multiple of `round_to`.
///
/// `NaN` values are skipped. With no finite values the range is `(zmid, zmid)`.
pub fn get_rounded_z_range_including_mid<I>(values: I, zmid: f64, round_to: Option<f64>) -> (f64, f64)
where
    I: IntoIterator<Item = f64>,
{
    let (mut zmin, mut zmax) = values
        .into_iter()
        .filter(|v| !v.is_nan())
        .fold((zmid, zmid), |(lo, hi), v| (lo.min(v), hi.max(v)));

    if let Some(round_to) = round_to.filter(|r| *r != 0.0) {
        zmin = floor_to(zmin, round_to);
        zmax = ceil_to(zmax, round_to);
    }

    (zmin, zmax)
}

/// Five-stop colour scale running red to green with white pinned at `v_mid`.
///
/// Positions are normalized to `[0, 1]`. A zero-width range puts white at 0.5.
pub fn make_centered_rg_colorscale(
    v_min: f64,
    v_max: f64,
    v_mid: f64,
    reverse: bool,
) -> Vec<(f64, &'static str)> {
    let v_range = v_max - v_min;
    let z_mid = if v_range == 0.0 {
        0.5
    } else {
        (v_mid - v_min) / v_range
    };

    let positions = [0.0, z_mid / 2.0, z_mid, (1.0 - z_mid) / 2.0 + z_mid, 1.0];

    let mut colors = [RED, DARK_RED, WHITE, DARK_GREEN, GREEN];
    if reverse {
        colors.reverse();
    }

    positions.into_iter().zip(colors).collect()
}
