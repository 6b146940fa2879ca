use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use anyhow::Result;
use cv2::prelude::*;
use opencv as cv2;

use crate::feature::TrackedPoint;
use crate::image::Image;
use crate::render::{Control, Overlay, Scene};
use crate::selection::PointerEvent;

const QUIT_KEY: char = 'q';

pub fn grayscale_to_cv_8u(img: &Image) -> Result<cv2::core::Mat> {
    let borrowed = unsafe {
        cv2::core::Mat::new_rows_cols_with_data(
            img.height as i32,
            img.width as i32,
            cv2::core::CV_8U,
            img.data.as_ptr() as *mut std::ffi::c_void,
            cv2::core::Mat_AUTO_STEP,
        )?
    };
    // own the pixels so drawing never touches the session's frame
    Ok(borrowed.try_clone()?)
}

fn to_cv_point(p: &crate::my_types::Vector2d) -> cv2::core::Point {
    cv2::core::Point {
        x: p.x.round() as i32,
        y: p.y.round() as i32,
    }
}

/// HighGUI window showing the tracked points; left mouse button events are
/// queued until the tick loop collects them.
pub struct Viewer {
    window: String,
    events: Arc<Mutex<VecDeque<PointerEvent>>>,
}

impl Viewer {
    pub fn new(window: &str) -> Result<Self> {
        cv2::highgui::named_window(window, cv2::highgui::WINDOW_AUTOSIZE)?;
        let events = Arc::new(Mutex::new(VecDeque::new()));
        let queue = events.clone();
        cv2::highgui::set_mouse_callback(
            window,
            Some(Box::new(move |event, x, y, _flags| {
                let event = match event {
                    cv2::highgui::EVENT_LBUTTONDOWN => PointerEvent::Down {
                        x: x as f64,
                        y: y as f64,
                    },
                    cv2::highgui::EVENT_LBUTTONUP => PointerEvent::Up {
                        x: x as f64,
                        y: y as f64,
                    },
                    _ => return,
                };
                if let Ok(mut queue) = queue.lock() {
                    queue.push_back(event);
                }
            })),
        )?;
        Ok(Self {
            window: window.to_string(),
            events,
        })
    }

    fn draw_point(color_mat: &mut cv2::core::Mat, point: &TrackedPoint) -> Result<()> {
        let location = match point.location() {
            Some(location) => location,
            None => return Ok(()),
        };
        let current_point_cv = to_cv_point(&location);
        let mut previous_point = None;
        for past in point.trail() {
            let past_cv = to_cv_point(past);
            if let Some(previous_point_cv) = previous_point {
                cv2::imgproc::line(
                    color_mat,
                    previous_point_cv,
                    past_cv,
                    cv2::core::Scalar::new(0.0, 255.0, 0.0, 0.0),
                    2,
                    cv2::imgproc::LINE_8,
                    0,
                )?;
            }
            previous_point = Some(past_cv);
        }
        if let Some(previous_point_cv) = previous_point {
            cv2::imgproc::line(
                color_mat,
                previous_point_cv,
                current_point_cv,
                cv2::core::Scalar::new(0.0, 255.0, 0.0, 0.0),
                2,
                cv2::imgproc::LINE_8,
                0,
            )?;
        }
        cv2::imgproc::circle(
            color_mat,
            current_point_cv,
            5,
            cv2::core::Scalar::new(0.0, 255.0, 0.0, 0.0),
            -1,
            cv2::imgproc::LINE_8,
            0,
        )?;
        Ok(())
    }
}

impl Overlay for Viewer {
    fn pointer_events(&mut self) -> Vec<PointerEvent> {
        match self.events.lock() {
            Ok(mut queue) => queue.drain(..).collect(),
            Err(_) => vec![],
        }
    }

    fn present(&mut self, scene: &Scene) -> Result<Control> {
        let cv_mat = grayscale_to_cv_8u(scene.frame)?;
        let mut color_mat = cv2::core::Mat::default();
        cv2::imgproc::cvt_color(&cv_mat, &mut color_mat, cv2::imgproc::COLOR_GRAY2BGR, 0)?;

        if let Some(region) = scene.region {
            let (min, max) = (to_cv_point(&region.min()), to_cv_point(&region.max()));
            cv2::imgproc::rectangle(
                &mut color_mat,
                cv2::core::Rect::new(min.x, min.y, max.x - min.x + 1, max.y - min.y + 1),
                cv2::core::Scalar::new(0.0, 255.0, 0.0, 0.0),
                2,
                cv2::imgproc::LINE_8,
                0,
            )?;
        }
        if let Some(start) = scene.pending {
            cv2::imgproc::draw_marker(
                &mut color_mat,
                to_cv_point(&start),
                cv2::core::Scalar::new(0.0, 0.0, 255.0, 0.0),
                cv2::imgproc::MARKER_CROSS,
                10,
                1,
                cv2::imgproc::LINE_8,
            )?;
        }
        for point in scene.points {
            Self::draw_point(&mut color_mat, point)?;
        }

        cv2::highgui::imshow(&self.window, &color_mat)?;
        let key = cv2::highgui::wait_key(1)?;
        Ok(if key & 0xFF == QUIT_KEY as i32 {
            Control::Quit
        } else {
            Control::Continue
        })
    }
}

impl Drop for Viewer {
    fn drop(&mut self) {
        let _ = cv2::highgui::destroy_window(&self.window);
    }
}
