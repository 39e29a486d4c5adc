//! Star-topology layout: a synthetic gateway node at the top, discovered hosts
//! on a circle around the viewport center, one edge per host.
//!
//! nmap does not report link-layer topology, so the star is presentational.
//! Pan, zoom and selection live in [`ViewState`] and never move model coordinates.

use std::f64::consts::PI;

use serde::{Deserialize, Serialize};

use crate::types::Host;

pub const GATEWAY_ID: &str = "gateway";
const GATEWAY_Y: f64 = 100.0;
const RADIUS_FACTOR: f64 = 0.25;
const LABEL_MAX: usize = 15;

pub const MIN_SCALE: f64 = 0.1;
pub const MAX_SCALE: f64 = 4.0;
const ZOOM_STEP: f64 = 1.5;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Viewport {
    pub width: f64,
    pub height: f64,
}

impl Viewport {
    /// Non-finite or non-positive dimensions fall back to the default size.
    pub fn new(width: f64, height: f64) -> Self {
        let d = Self::default();
        let pick = |v: f64, fallback: f64| if v.is_finite() && v > 0.0 { v } else { fallback };
        Self {
            width: pick(width, d.width),
            height: pick(height, d.height),
        }
    }

    pub fn center(&self) -> (f64, f64) {
        (self.width / 2.0, self.height / 2.0)
    }
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            width: 800.0,
            height: 600.0,
        }
    }
}

/// Icon class for a node, guessed from hostname keywords and well-known ports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceKind {
    Router,
    Phone,
    Printer,
    Camera,
    Computer,
    Server,
}

impl DeviceKind {
    pub fn classify(host: &Host) -> Self {
        let name = host.hostname.as_deref().unwrap_or_default().to_lowercase();
        let any = |words: &[&str]| words.iter().any(|w| name.contains(w));
        if any(&["router", "gateway"]) {
            Self::Router
        } else if any(&["phone", "mobile", "android", "iphone"]) {
            Self::Phone
        } else if any(&["printer", "hp", "canon", "epson"]) {
            Self::Printer
        } else if any(&["camera", "cam"]) || host.ports.iter().any(|p| p.port == 554) {
            Self::Camera
        } else if any(&["desktop", "pc", "laptop"]) {
            Self::Computer
        } else {
            Self::Server
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TopologyNode {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ip: Option<String>,
    pub label: String,
    pub kind: DeviceKind,
    pub open_ports: usize,
    pub x: f64,
    pub y: f64,
    pub selected: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Edge {
    pub source: String,
    pub target: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Topology {
    pub gateway: TopologyNode,
    pub devices: Vec<TopologyNode>,
    pub edges: Vec<Edge>,
}

impl Topology {
    pub fn node_count(&self) -> usize {
        self.devices.len() + 1
    }

    pub fn node(&self, id: &str) -> Option<&TopologyNode> {
        std::iter::once(&self.gateway)
            .chain(&self.devices)
            .find(|n| n.id == id)
    }

    /// Annotate the gateway with the router address guessed from the scan range.
    pub fn with_gateway_ip(mut self, ip: impl Into<String>) -> Self {
        self.gateway.ip = Some(ip.into());
        self
    }
}

fn label_for(text: &str) -> String {
    if text.chars().count() > LABEL_MAX {
        let head: String = text.chars().take(12).collect();
        format!("{head}...")
    } else {
        text.to_string()
    }
}

/// Place the gateway and every host. Pure and deterministic.
pub fn layout(hosts: &[Host], viewport: Viewport) -> Topology {
    let (cx, cy) = viewport.center();
    let radius = viewport.width.min(viewport.height) * RADIUS_FACTOR;
    let n = hosts.len();

    let gateway = TopologyNode {
        id: GATEWAY_ID.to_string(),
        ip: None,
        label: "Gateway/Router".to_string(),
        kind: DeviceKind::Router,
        open_ports: 0,
        x: cx,
        y: GATEWAY_Y,
        selected: false,
    };

    let devices: Vec<TopologyNode> = hosts
        .iter()
        .enumerate()
        .map(|(i, host)| {
            let angle = 2.0 * PI * i as f64 / n as f64;
            TopologyNode {
                id: host.ip.clone(),
                ip: Some(host.ip.clone()),
                label: label_for(host.named_hostname().unwrap_or(&host.ip)),
                kind: DeviceKind::classify(host),
                open_ports: host.ports.len(),
                x: cx + radius * angle.cos(),
                y: cy + radius * angle.sin(),
                selected: false,
            }
        })
        .collect();

    let edges = hosts
        .iter()
        .map(|h| Edge {
            source: GATEWAY_ID.to_string(),
            target: h.ip.clone(),
        })
        .collect();

    Topology {
        gateway,
        devices,
        edges,
    }
}

/// Pan/zoom/selection state of one topology viewer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewState {
    pub scale: f64,
    pub pan_x: f64,
    pub pan_y: f64,
    pub selected: Option<String>,
}

impl Default for ViewState {
    fn default() -> Self {
        Self {
            scale: 1.0,
            pan_x: 0.0,
            pan_y: 0.0,
            selected: None,
        }
    }
}

impl ViewState {
    /// Scale by `factor` around a fixed screen point.
    pub fn zoom_at(&mut self, factor: f64, (px, py): (f64, f64)) {
        if !factor.is_finite() || factor <= 0.0 {
            return;
        }
        let next = (self.scale * factor).clamp(MIN_SCALE, MAX_SCALE);
        let ratio = next / self.scale;
        self.pan_x = px - (px - self.pan_x) * ratio;
        self.pan_y = py - (py - self.pan_y) * ratio;
        self.scale = next;
    }

    pub fn zoom_in(&mut self, viewport: Viewport) {
        self.zoom_at(ZOOM_STEP, viewport.center());
    }

    pub fn zoom_out(&mut self, viewport: Viewport) {
        self.zoom_at(1.0 / ZOOM_STEP, viewport.center());
    }

    /// Mouse wheel: scrolling down zooms out.
    pub fn wheel(&mut self, delta_y: f64, viewport: Viewport) {
        let factor = if delta_y > 0.0 { 0.9 } else { 1.1 };
        self.zoom_at(factor, viewport.center());
    }

    pub fn pan_by(&mut self, dx: f64, dy: f64) {
        self.pan_x += dx;
        self.pan_y += dy;
    }

    pub fn reset_zoom(&mut self) {
        self.scale = 1.0;
        self.pan_x = 0.0;
        self.pan_y = 0.0;
    }

    /// Model coordinates to screen coordinates.
    pub fn transform(&self, x: f64, y: f64) -> (f64, f64) {
        (x * self.scale + self.pan_x, y * self.scale + self.pan_y)
    }

    /// Click on a node id, or on empty space with `None`.
    pub fn click(&mut self, target: Option<&str>) {
        self.selected = match (target, self.selected.as_deref()) {
            (Some(t), Some(cur)) if t == cur => None,
            (Some(t), _) => Some(t.to_string()),
            (None, _) => None,
        };
    }

    /// Mark the selected node, dropping the selection when it is no longer laid out.
    pub fn apply_selection(&mut self, topology: &mut Topology) {
        let Some(id) = self.selected.as_deref() else {
            return;
        };
        let node = std::iter::once(&mut topology.gateway)
            .chain(topology.devices.iter_mut())
            .find(|n| n.id == id);
        match node {
            Some(n) => n.selected = true,
            None => self.selected = None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::PortInfo;

    fn hosts(n: usize) -> Vec<Host> {
        (1..=n).map(|i| Host::new(format!("10.0.0.{i}"))).collect()
    }

    #[test]
    fn gateway_top_center_and_single_host_at_angle_zero() {
        let topo = layout(&hosts(1), Viewport::new(800.0, 600.0));
        assert_eq!((topo.gateway.x, topo.gateway.y), (400.0, 100.0));
        let d = &topo.devices[0];
        assert!((d.x - 550.0).abs() < 1e-9);
        assert!((d.y - 300.0).abs() < 1e-9);
    }

    #[test]
    fn four_hosts_on_the_compass_points() {
        let topo = layout(&hosts(4), Viewport::new(400.0, 400.0));
        let pts: Vec<(f64, f64)> = topo.devices.iter().map(|d| (d.x, d.y)).collect();
        let expect = [(300.0, 200.0), (200.0, 300.0), (100.0, 200.0), (200.0, 100.0)];
        for ((x, y), (ex, ey)) in pts.iter().zip(expect) {
            assert!((x - ex).abs() < 1e-9 && (y - ey).abs() < 1e-9, "{x},{y} vs {ex},{ey}");
        }
    }

    #[test]
    fn labels_and_kinds() {
        let mut cam = Host::new("10.0.0.7");
        cam.ports.push(PortInfo::open(554, "rtsp"));
        let mut printer = Host::new("10.0.0.8");
        printer.hostname = Some("office-printer-second-floor".into());
        let topo = layout(&[cam, printer], Viewport::default());
        assert_eq!(topo.devices[0].kind, DeviceKind::Camera);
        assert_eq!(topo.devices[0].label, "10.0.0.7");
        assert_eq!(topo.devices[1].kind, DeviceKind::Printer);
        assert_eq!(topo.devices[1].label, "office-print...");
    }

    #[test]
    fn invalid_viewport_falls_back() {
        assert_eq!(Viewport::new(f64::NAN, -1.0), Viewport::default());
    }

    #[test]
    fn zoom_is_clamped_and_keeps_center_fixed() {
        let vp = Viewport::new(800.0, 600.0);
        let mut view = ViewState::default();
        view.zoom_in(vp);
        assert_eq!(view.scale, 1.5);
        let (cx, cy) = vp.center();
        let (sx, sy) = view.transform(cx, cy);
        assert!((sx - cx).abs() < 1e-9 && (sy - cy).abs() < 1e-9);

        for _ in 0..20 {
            view.zoom_in(vp);
        }
        assert_eq!(view.scale, MAX_SCALE);
        for _ in 0..40 {
            view.wheel(120.0, vp);
        }
        assert!((view.scale - MIN_SCALE).abs() < 1e-12);

        view.pan_by(10.0, -5.0);
        view.reset_zoom();
        assert_eq!(view, ViewState::default());
    }

    #[test]
    fn click_toggles_selection() {
        let mut view = ViewState::default();
        view.click(Some("10.0.0.1"));
        assert_eq!(view.selected.as_deref(), Some("10.0.0.1"));
        view.click(Some("gateway"));
        assert_eq!(view.selected.as_deref(), Some("gateway"));
        view.click(Some("gateway"));
        assert_eq!(view.selected, None);
        view.click(Some("10.0.0.1"));
        view.click(None);
        assert_eq!(view.selected, None);
    }

    #[test]
    fn selection_marks_node_and_drops_vanished_ids() {
        let mut topo = layout(&hosts(2), Viewport::default());
        let mut view = ViewState::default();
        view.click(Some("10.0.0.2"));
        view.apply_selection(&mut topo);
        assert!(topo.node("10.0.0.2").unwrap().selected);
        assert!(!topo.node("10.0.0.1").unwrap().selected);

        let mut smaller = layout(&hosts(1), Viewport::default());
        view.apply_selection(&mut smaller);
        assert_eq!(view.selected, None);
    }
}
