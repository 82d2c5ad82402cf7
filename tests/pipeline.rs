use std::ops::ControlFlow;
use std::sync::{Arc, Mutex};

use serde_json::json;

use tsplot::{
    ActiveData, ChartRenderer, CoordinatorConfig, Dataset, DatasetsBuilder, ErrorHandler,
    MathFunction, MessageBlock, MessageEvent, PipelineError, PlayerState, PlotConfig,
    PlotCoordinator, PlotPath, Range, RenderFrame, RenderWorker, ScreenPoint, Size, Time,
    TimestampMethod, Viewport, XAxisMode, build_series_configs, create_builder, csv_string,
};

#[derive(Clone, Default)]
struct RecordingRenderer {
    frames: Arc<Mutex<Vec<(RenderFrame, Vec<Dataset>)>>>,
}

impl RecordingRenderer {
    fn last_datasets(&self) -> Vec<Dataset> {
        self.frames
            .lock()
            .unwrap()
            .last()
            .map(|(_, datasets)| datasets.clone())
            .unwrap_or_default()
    }
}

impl ChartRenderer for RecordingRenderer {
    fn draw(&mut self, frame: &RenderFrame, datasets: &[Dataset]) {
        self.frames.lock().unwrap().push((*frame, datasets.to_vec()));
    }
}

struct PanickingRenderer;

impl ChartRenderer for PanickingRenderer {
    fn draw(&mut self, _frame: &RenderFrame, _datasets: &[Dataset]) {
        panic!("surface lost");
    }
}

fn fail_on_error() -> ErrorHandler {
    Arc::new(|err| panic!("unexpected pipeline error: {err}"))
}

fn cmd_vel(sec: i64, x: f64) -> MessageEvent {
    MessageEvent::new("/cmd_vel", Time::new(sec, 0), json!({ "linear": { "x": x } }))
}

fn player_state(messages: Vec<MessageEvent>, current: i64, last_seek_time: u64) -> PlayerState {
    PlayerState::active(ActiveData {
        messages,
        start_time: Time::new(100, 0),
        end_time: Time::new(110, 0),
        current_time: Time::new(100 + current, 0),
        last_seek_time,
    })
}

fn shifted(events: Vec<MessageEvent>) -> Vec<MessageEvent> {
    events
        .into_iter()
        .map(|mut event| {
            event.receive_time = Time::new(event.receive_time.sec + 100, event.receive_time.nsec);
            event
        })
        .collect()
}

fn plot_config(paths: Vec<PlotPath>) -> PlotConfig {
    PlotConfig {
        paths,
        ..PlotConfig::default()
    }
}

fn points(dataset: &Dataset) -> Vec<(f64, f64)> {
    dataset.data.iter().map(|item| (item.x, item.y)).collect()
}

#[test]
fn cmd_vel_samples_plot_without_downsampling() {
    let config = plot_config(vec![PlotPath::new("/cmd_vel.linear.x")]);
    let mut builder = create_builder(XAxisMode::Timestamp, None, fail_on_error()).unwrap();
    builder.set_series(&build_series_configs(&config));
    builder.handle_player_state(&player_state(
        shifted(vec![cmd_vel(0, 1.0), cmd_vel(1, 2.0), cmd_vel(2, 3.0)]),
        2,
        0,
    ));

    let viewport = Viewport::from_x(Range::new(0.0, 2.0), Size::new(400.0, 300.0));
    let datasets = builder.viewport_datasets(&viewport).unwrap();
    assert_eq!(points(&datasets[0]), vec![(0.0, 1.0), (1.0, 2.0), (2.0, 3.0)]);
}

#[test]
fn abs_modifier_rewrites_sample_and_value() {
    let config = plot_config(vec![PlotPath::new("/cmd_vel.linear.x").with_math(MathFunction::Abs)]);
    let mut builder = create_builder(XAxisMode::Timestamp, None, fail_on_error()).unwrap();
    builder.set_series(&build_series_configs(&config));
    builder.handle_player_state(&player_state(shifted(vec![cmd_vel(0, -5.0)]), 0, 0));

    let csv = builder.csv_data().unwrap();
    assert_eq!(csv[0].data[0].y, 5.0);
    assert_eq!(csv[0].data[0].value, json!(5.0));
}

#[test]
fn invalid_series_are_skipped_not_fatal() {
    let config = plot_config(vec![
        PlotPath::new("not a path"),
        PlotPath::new("/cmd_vel.linear.x"),
        PlotPath {
            math_modifier: Some("cube".to_string()),
            ..PlotPath::new("/cmd_vel.linear.y")
        },
    ]);
    let renderer = RecordingRenderer::default();
    let mut coordinator = PlotCoordinator::new(
        config,
        renderer.clone(),
        CoordinatorConfig::default(),
        fail_on_error(),
    )
    .unwrap();
    coordinator.set_size(Size::new(300.0, 200.0));
    coordinator.handle_player_state(&player_state(shifted(vec![cmd_vel(0, 1.0)]), 0, 0));

    let datasets = renderer.last_datasets();
    assert_eq!(datasets.len(), 1);
    assert_eq!(datasets[0].series_index, 1);
}

#[test]
fn seek_replaces_live_data_and_blocks_fill_history() {
    let config = plot_config(vec![PlotPath::new("/cmd_vel.linear.x")]);
    let renderer = RecordingRenderer::default();
    let mut coordinator = PlotCoordinator::new(
        config,
        renderer.clone(),
        CoordinatorConfig::default(),
        fail_on_error(),
    )
    .unwrap();
    coordinator.set_size(Size::new(300.0, 200.0));

    coordinator.handle_player_state(&player_state(shifted(vec![cmd_vel(1, 1.0)]), 1, 0));
    coordinator.handle_player_state(&player_state(shifted(vec![cmd_vel(6, 6.0)]), 6, 1));
    assert_eq!(points(&renderer.last_datasets()[0]), vec![(6.0, 6.0)]);

    let block = MessageBlock::new()
        .with_topic("/cmd_vel", shifted(vec![cmd_vel(0, 0.5), cmd_vel(3, 3.5)]));
    let blocks = vec![Some(Arc::new(block)), None];
    let mut checks = 0;
    let flow = coordinator.handle_blocks(Time::new(100, 0), &blocks, &mut || {
        checks += 1;
        ControlFlow::Continue(())
    });
    assert_eq!(flow, ControlFlow::Continue(()));
    assert!(checks > 0);

    let xs: Vec<_> = renderer.last_datasets()[0].data.iter().map(|item| item.x).collect();
    assert_eq!(xs, vec![0.0, 3.0, 6.0]);

    let csv = csv_string(&coordinator.csv_data().unwrap()).unwrap();
    assert_eq!(csv.lines().count(), 4);
    assert!(csv.lines().nth(1).unwrap().starts_with("0,100.000000000,,/cmd_vel.linear.x,0.5"));
}

#[test]
fn header_stamp_series_drop_unstamped_messages() {
    let config = plot_config(vec![
        PlotPath::new("/odom.v").with_timestamp_method(TimestampMethod::HeaderStamp),
    ]);
    let mut builder = create_builder(XAxisMode::PartialTimestamp, None, fail_on_error()).unwrap();
    builder.set_series(&build_series_configs(&config));
    builder.handle_player_state(&player_state(
        vec![
            MessageEvent::new(
                "/odom",
                Time::new(105, 0),
                json!({ "v": 1.5, "header": { "stamp": { "sec": 104, "nsec": 0 } } }),
            ),
            MessageEvent::new("/odom", Time::new(106, 0), json!({ "v": 2.5 })),
        ],
        5,
        0,
    ));
    let csv = builder.csv_data().unwrap();
    assert_eq!(csv[0].data.len(), 1);
    assert_eq!(csv[0].data[0].x, 4.0);
}

#[test]
fn render_worker_returns_sentinels_after_destroy() {
    let mut worker =
        RenderWorker::spawn(RecordingRenderer::default(), 10.0, fail_on_error()).unwrap();
    worker.destroy();
    let frame = RenderFrame {
        size: Size::new(10.0, 10.0),
        bounds: tsplot::Bounds::new(Range::new(0.0, 1.0), Range::new(0.0, 1.0)),
        playhead_x: None,
    };
    assert_eq!(worker.update(frame), None);
    assert_eq!(worker.update_datasets(Vec::new()), None);
    assert!(worker.elements_at_pixel(ScreenPoint::new(5.0, 5.0)).is_empty());
}

#[test]
fn renderer_panic_reaches_error_handler() {
    let errors = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&errors);
    let on_error: ErrorHandler = Arc::new(move |err| sink.lock().unwrap().push(err));
    let config = plot_config(vec![PlotPath::new("/cmd_vel.linear.x")]);
    let mut coordinator =
        PlotCoordinator::new(config, PanickingRenderer, CoordinatorConfig::default(), on_error)
            .unwrap();
    coordinator.set_size(Size::new(300.0, 200.0));
    assert_eq!(coordinator.handle_player_state(&player_state(Vec::new(), 0, 0)), None);
    assert_eq!(coordinator.handle_player_state(&player_state(Vec::new(), 0, 0)), None);
    coordinator.destroy();

    let errors = errors.lock().unwrap();
    assert_eq!(errors.len(), 1);
    assert!(matches!(&errors[0], PipelineError::WorkerPanicked { worker: "render", .. }));
}

#[test]
fn dropping_coordinator_without_destroy_stops_workers() {
    let config = plot_config(vec![PlotPath::new("/cmd_vel.linear.x")]);
    let renderer = RecordingRenderer::default();
    let mut coordinator = PlotCoordinator::new(
        config,
        renderer.clone(),
        CoordinatorConfig::default(),
        fail_on_error(),
    )
    .unwrap();
    let events = coordinator.subscribe();
    drop(coordinator);
    assert!(events.recv().is_err());
    assert_eq!(Arc::strong_count(&renderer.frames), 1);
}
