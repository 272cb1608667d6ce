// Client viewport (map bounding box) handling.

/// A bounding rectangle in degrees. Callers guarantee `sw <= ne` on
/// each axis; nothing here validates or normalizes date-line wraps.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub sw_lat: f64,
    pub sw_lng: f64,
    pub ne_lat: f64,
    pub ne_lng: f64,
}

impl Viewport {
    /// Build a viewport from four optional corners. Any corner that is
    /// unset or non-finite disables spatial filtering entirely, so the
    /// result is `None` unless all four parsed to finite floats.
    pub fn from_corners(
        sw_lat: Option<f64>,
        sw_lng: Option<f64>,
        ne_lat: Option<f64>,
        ne_lng: Option<f64>,
    ) -> Option<Viewport> {
        match (sw_lat, sw_lng, ne_lat, ne_lng) {
            (Some(sw_lat), Some(sw_lng), Some(ne_lat), Some(ne_lng))
                if sw_lat.is_finite()
                    && sw_lng.is_finite()
                    && ne_lat.is_finite()
                    && ne_lng.is_finite() =>
            {
                Some(Viewport {
                    sw_lat,
                    sw_lng,
                    ne_lat,
                    ne_lng,
                })
            }
            _ => None,
        }
    }

    /// True if `other` lies strictly inside this viewport on every
    /// edge. Used for pan detection: a zoom-in uncovers no new area.
    pub fn strictly_contains(&self, other: &Viewport) -> bool {
        self.sw_lat < other.sw_lat
            && self.sw_lng < other.sw_lng
            && self.ne_lat > other.ne_lat
            && self.ne_lng > other.ne_lng
    }

    /// Grow the box outward by fixed margins on each axis.
    pub fn expand(&self, lat_delta: f64, lng_delta: f64) -> Viewport {
        Viewport {
            sw_lat: self.sw_lat - lat_delta,
            sw_lng: self.sw_lng - lng_delta,
            ne_lat: self.ne_lat + lat_delta,
            ne_lng: self.ne_lng + lng_delta,
        }
    }
}
