use lan_map_rs::topology::{layout, ViewState, Viewport, GATEWAY_ID};
use lan_map_rs::types::Host;

fn hosts(n: usize) -> Vec<Host> {
    (0..n).map(|i| Host::new(format!("192.168.1.{}", i + 10))).collect()
}

#[test]
fn layout_is_deterministic() {
    let hs = hosts(7);
    let vp = Viewport::new(1024.0, 640.0);
    assert_eq!(layout(&hs, vp), layout(&hs, vp));
}

#[test]
fn n_hosts_give_n_devices_one_gateway_n_edges() {
    for n in [0, 1, 2, 13] {
        let topo = layout(&hosts(n), Viewport::default());
        assert_eq!(topo.devices.len(), n);
        assert_eq!(topo.node_count(), n + 1);
        assert_eq!(topo.edges.len(), n);
        assert!(topo.edges.iter().all(|e| e.source == GATEWAY_ID));
        assert_eq!(topo.gateway.id, GATEWAY_ID);
    }
}

#[test]
fn devices_sit_on_the_circle_in_filtered_order() {
    let vp = Viewport::new(900.0, 500.0);
    let hs = hosts(5);
    let topo = layout(&hs, vp);
    let radius = 500.0 * 0.25;
    for (node, host) in topo.devices.iter().zip(&hs) {
        assert_eq!(node.id, host.ip);
        let d = ((node.x - 450.0).powi(2) + (node.y - 250.0).powi(2)).sqrt();
        assert!((d - radius).abs() < 1e-9);
    }
    assert_eq!(topo.edges[3].target, hs[3].ip);
}

#[test]
fn resize_relayouts_from_scratch() {
    let hs = hosts(3);
    let small = layout(&hs, Viewport::new(400.0, 300.0));
    let large = layout(&hs, Viewport::new(1600.0, 1200.0));
    assert_eq!(large, layout(&hs, Viewport::new(1600.0, 1200.0)));
    assert_ne!(small.devices[0].x, large.devices[0].x);
    assert_eq!(large.gateway.x, 800.0);
    assert_eq!(large.gateway.y, 100.0);
}

#[test]
fn zoom_and_pan_leave_model_coordinates_alone() {
    let vp = Viewport::default();
    let hs = hosts(4);
    let topo = layout(&hs, vp);
    let before = topo.clone();

    let mut view = ViewState::default();
    view.zoom_in(vp);
    view.pan_by(25.0, -40.0);
    let (sx, sy) = view.transform(topo.gateway.x, topo.gateway.y);
    assert!((sx - topo.gateway.x).abs() > 1.0 || (sy - topo.gateway.y).abs() > 1.0);

    view.click(Some(hs[2].ip.as_str()));
    let mut marked = topo.clone();
    view.apply_selection(&mut marked);
    assert_eq!(topo, before);
    assert_eq!(marked.devices.iter().filter(|d| d.selected).count(), 1);
    assert_eq!(marked.devices[2].x, before.devices[2].x);
}

#[test]
fn zoom_out_undoes_zoom_in_around_the_center() {
    let vp = Viewport::default();
    let mut view = ViewState::default();
    view.zoom_in(vp);
    let (cx, cy) = view.transform(vp.width / 2.0, vp.height / 2.0);
    assert!((cx - vp.width / 2.0).abs() < 1e-9 && (cy - vp.height / 2.0).abs() < 1e-9);

    view.zoom_out(vp);
    assert!((view.scale - 1.0).abs() < 1e-9);
    assert!(view.pan_x.abs() < 1e-9 && view.pan_y.abs() < 1e-9);
}
