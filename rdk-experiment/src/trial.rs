use crate::confidence::rate_confidence;
use crate::config::SessionConfig;
use crate::error::SessionError;
use crate::input::{Key, Screen};
use rand::Rng;
use rdk_core::geometry::heading;
use rdk_core::{
    palette, Drawable, Frame, FrameScheduler, MotionParams, Phase, Point, ReferenceDirection,
    Rgba, SessionStage, TrialOutcome, TrialParams, TrialState,
};

/// Presents `frame` on every refresh until `seconds` have passed.
pub fn hold<D: Screen + ?Sized>(
    screen: &mut D,
    frame: &Frame<'_>,
    seconds: f64,
) -> Result<(), SessionError> {
    let start = screen.now();
    loop {
        if screen.abort_requested() {
            return Err(SessionError::Aborted);
        }
        screen.present_frame(frame)?;
        if screen.now() - start >= seconds {
            return Ok(());
        }
    }
}

/// Shows a text screen until the confirm key is pressed.
pub fn show_instructions<D: Screen + ?Sized>(
    screen: &mut D,
    config: &SessionConfig,
    text: &str,
) -> Result<(), SessionError> {
    let frame = Frame::new(vec![Drawable::Text {
        content: text,
        position: Point::new(0.0, 2.0),
        height: 0.8,
        color: palette::WHITE,
    }]);
    screen.present_frame(&frame)?;
    screen.clear_events();
    screen.wait_for_key(&[config.keys.confirm])?;
    Ok(())
}

/// Half-width of the reference tick, in degrees.
const REFERENCE_TICK: f64 = 1.0;

/// Runs single trials: fixation, dots, reference, response and the
/// stage-specific tail.
pub struct TrialRunner<'c> {
    config: &'c SessionConfig,
    motion: MotionParams,
}

impl<'c> TrialRunner<'c> {
    pub fn new(config: &'c SessionConfig, motion: MotionParams) -> Self {
        Self { config, motion }
    }

    pub fn motion(&self) -> &MotionParams {
        &self.motion
    }

    fn fixation_frame(&self, color: Rgba) -> Frame<'static> {
        Frame::new(vec![
            Drawable::ApertureOutline {
                radius: self.motion.aperture_radius,
                color: palette::WHITE,
            },
            Drawable::Fixation {
                diameter: self.motion.fixation_diameter,
                color,
            },
        ])
    }

    /// Aperture, blue CW arc, orange CCW arc, reference tick and fixation.
    pub fn reference_frame(&self, reference_angle: f64, fixation: Rgba) -> Frame<'static> {
        let r = self.motion.aperture_radius;
        Frame::new(vec![
            Drawable::ApertureOutline {
                radius: r,
                color: palette::WHITE,
            },
            Drawable::Arc {
                radius: r,
                start_deg: reference_angle,
                end_deg: reference_angle - 90.0,
                color: palette::BLUE,
            },
            Drawable::Arc {
                radius: r,
                start_deg: reference_angle,
                end_deg: reference_angle + 90.0,
                color: palette::ORANGE,
            },
            Drawable::Line {
                from: heading(reference_angle, r - REFERENCE_TICK),
                to: heading(reference_angle, r + REFERENCE_TICK),
                width_px: 5.0,
                color: palette::WHITE,
            },
            Drawable::Fixation {
                diameter: self.motion.fixation_diameter,
                color: fixation,
            },
        ])
    }

    fn response_for(&self, key: Key) -> ReferenceDirection {
        if key == self.config.keys.response[0] {
            ReferenceDirection::Cw
        } else {
            ReferenceDirection::Ccw
        }
    }

    /// Runs one trial to completion. An abort anywhere returns
    /// `Err(Aborted)` and nothing about the trial is kept.
    pub fn run<D, R>(
        &self,
        screen: &mut D,
        rng: &mut R,
        stage: SessionStage,
        trial: &TrialParams,
    ) -> Result<TrialOutcome, SessionError>
    where
        D: Screen + ?Sized,
        R: Rng + ?Sized,
    {
        let timing = &self.config.timing;
        log::debug!(
            "{:?}: direction {:.2}, coherence {}, distance {}, reference {:.2} ({})",
            TrialState::Fixation,
            trial.direction,
            trial.coherence,
            trial.distance,
            trial.reference_angle,
            trial.reference_direction
        );

        let [iti_min, iti_max] = timing.inter_trial_interval;
        let delay = rng.random_range(iti_min..=iti_max);
        hold(screen, &self.fixation_frame(palette::WHITE), delay)?;

        let mut scheduler =
            FrameScheduler::new(self.motion, trial.direction, trial.coherence, rng.random());
        let frames = scheduler.run(screen)?;
        log::debug!("{:?}: {frames} frames", TrialState::Stimulus);

        screen.present_frame(&self.reference_frame(trial.reference_angle, palette::WHITE))?;
        screen.clear_events();
        let onset = screen.now();
        let press = screen.wait_for_key(&self.config.keys.response)?;
        let response = self.response_for(press.key);
        let correct = trial.is_correct(response);
        log::debug!(
            "{:?}: {response} ({})",
            TrialState::Response,
            if correct { "correct" } else { "wrong" }
        );

        let choice_color = match response {
            ReferenceDirection::Cw => palette::BLUE,
            ReferenceDirection::Ccw => palette::ORANGE,
        };
        hold(
            screen,
            &self.reference_frame(trial.reference_angle, choice_color),
            timing.choice_display,
        )?;

        if stage.gives_feedback() && self.config.training.feedback {
            let color = if correct { palette::LIME } else { palette::RED };
            hold(screen, &self.fixation_frame(color), timing.feedback)?;
        }

        let mut confidence = None;
        if stage.asks_confidence() && rng.random_bool(self.config.task.confidence_probability) {
            log::debug!("{:?}", TrialState::Confidence);
            confidence = Some(rate_confidence(screen, &self.config.keys, rng)?);
        }

        hold(screen, &Frame::blank(), timing.blank)?;
        log::trace!("{:?}", TrialState::Complete);

        Ok(TrialOutcome {
            response,
            response_time: press.timestamp - onset,
            correct,
            confidence,
        })
    }
}
