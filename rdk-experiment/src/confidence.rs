use crate::config::KeyConfig;
use crate::error::SessionError;
use crate::input::Screen;
use crate::trial::hold;
use rand::Rng;
use rdk_core::{palette, ConfidenceRating, Drawable, Frame, Point, Rgba};

pub const CONFIDENCE_LABELS: [&str; 6] = ["50%", "60%", "70%", "80%", "90%", "100%"];

const SLIDER_WIDTH: f64 = 12.0;
const CONFIRM_DISPLAY: f64 = 0.5;

fn slider_frame(marker: usize, marker_color: Rgba) -> Frame<'static> {
    Frame::new(vec![
        Drawable::Text {
            content: "How confident are you?",
            position: Point::new(0.0, 5.0),
            height: 1.0,
            color: palette::WHITE,
        },
        Drawable::Slider {
            center: Point::ORIGIN,
            width: SLIDER_WIDTH,
            ticks: CONFIDENCE_LABELS.len(),
            marker,
            labels: &CONFIDENCE_LABELS,
            marker_color,
        },
    ])
}

/// Percentage for a marker position, 50 to 100 in steps of ten.
pub fn rating_for(marker: usize) -> u8 {
    50 + 10 * marker.min(CONFIDENCE_LABELS.len() - 1) as u8
}

/// Runs the confidence slider until the confirm key is pressed.
///
/// The two response keys move the marker left and right; it starts on a
/// random tick. The response time runs from slider onset.
pub fn rate_confidence<D, R>(
    screen: &mut D,
    keys: &KeyConfig,
    rng: &mut R,
) -> Result<ConfidenceRating, SessionError>
where
    D: Screen + ?Sized,
    R: Rng + ?Sized,
{
    let last = CONFIDENCE_LABELS.len() - 1;
    let mut marker = rng.random_range(0..=last);
    let [left, right] = keys.response;
    let filter = [left, right, keys.confirm];

    screen.present_frame(&slider_frame(marker, palette::WHITE))?;
    screen.clear_events();
    let onset = screen.now();

    let confirmed_at = 'rating: loop {
        if screen.abort_requested() {
            return Err(SessionError::Aborted);
        }
        for press in screen.poll_keys(&filter) {
            if press.key == keys.confirm {
                break 'rating press.timestamp;
            } else if press.key == left {
                marker = marker.saturating_sub(1);
            } else if press.key == right {
                marker = (marker + 1).min(last);
            }
        }
        screen.present_frame(&slider_frame(marker, palette::WHITE))?;
    };

    hold(screen, &slider_frame(marker, palette::BLACK), CONFIRM_DISPLAY)?;
    let rating = ConfidenceRating {
        rating: rating_for(marker),
        response_time: confirmed_at - onset,
    };
    log::debug!("confidence {}% after {:.3}s", rating.rating, rating.response_time);
    Ok(rating)
}
