mod args;

use args::{Args, Mode, NamedRect};
use roi_analyzer::analysis::{AnalysisResult, RoiAnalyzer, TargetManager, TesseractRecognizer};
use roi_analyzer::error::{RoiError, RoiResult};
use roi_analyzer::layout::{TemplateApplier, TemplateBuilder, TemplateStore};
use roi_analyzer::monitor::{
    FileFrameSource, MonitorCommand, MonitorEvent, RoiMonitor, create_monitor_channels,
};
use roi_analyzer::report::{AnalysisReport, OutputSettings, WindowDimensions, save_report};
use roi_analyzer::session::Session;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::time::{Duration, Instant};

fn main() {
    let Some(args) = Args::parse() else {
        return;
    };

    let default_level = if args.debug_mode { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .init();

    if let Err(e) = run(&args) {
        eprintln!("❌ {e}");
        std::process::exit(1);
    }
}

fn run(args: &Args) -> RoiResult<()> {
    match &args.mode {
        Mode::Analyze => {
            let mut session = open_session(args)?;
            add_cli_rois(&mut session, args)?;
            analyze_session(&mut session, args)
        }
        Mode::Apply => {
            let name = args
                .template
                .as_deref()
                .ok_or_else(|| RoiError::invalid_argument("--apply needs --template=NAME"))?;
            let store = TemplateStore::open(&args.templates_dir)?;
            let template = store.require(name)?;

            let mut session = open_session(args)?;
            let applied = session.apply_template(&TemplateApplier::new(), template)?;
            for warning in &applied.warnings {
                println!("⚠️ {warning}");
            }
            match &applied.transform {
                Some(t) => println!("📐 Template '{name}' aligned: {t}"),
                None => println!("📐 Template '{name}' placed without alignment"),
            }
            analyze_session(&mut session, args)
        }
        Mode::CreateTemplate(name) => create_template(name, args),
        Mode::ListTemplates => {
            let store = TemplateStore::open(&args.templates_dir)?;
            if store.templates().is_empty() {
                println!("📂 No templates in {}", store.dir().display());
            }
            for template in store.templates() {
                println!(
                    "📄 {} - {} ROIs ({} fixed), {} reference regions, method {}",
                    template.name,
                    template.rois.len(),
                    template.fixed_count(),
                    template.template_regions.len(),
                    template.match_method
                );
            }
            Ok(())
        }
        Mode::Monitor => monitor(args),
    }
}

fn require_image(args: &Args) -> RoiResult<&Path> {
    args.image
        .as_deref()
        .ok_or_else(|| RoiError::invalid_argument("an --image=PATH is required"))
}

fn open_session(args: &Args) -> RoiResult<Session> {
    let mut session = Session::new(args.analysis_config());
    session.load_image(require_image(args)?)?;
    if let Some((w, h)) = args.canvas {
        session.set_canvas_size(w, h);
    }
    Ok(session)
}

fn add_cli_rois(session: &mut Session, args: &Args) -> RoiResult<()> {
    for roi in args.rois.iter().chain(&args.matched_rois) {
        session.add_roi(roi.rect, roi.name.clone())?;
    }
    if session.rois().is_empty() {
        return Err(RoiError::invalid_argument(
            "no ROIs given; use --roi=NAME:X1,Y1,X2,Y2",
        ));
    }
    Ok(())
}

fn load_targets(args: &Args) -> RoiResult<TargetManager> {
    let mut targets = TargetManager::new();
    if let Some(path) = &args.targets {
        let count = targets.load_set(path)?;
        println!("🎯 Loaded {count} target images");
    }
    Ok(targets)
}

fn new_analyzer(session: &Session) -> RoiAnalyzer {
    RoiAnalyzer::new(Arc::new(TesseractRecognizer::new()), session.config().clone())
}

fn analyze_session(session: &mut Session, args: &Args) -> RoiResult<()> {
    let targets = load_targets(args)?;
    let analyzer = new_analyzer(session);
    let image = session
        .image()
        .cloned()
        .ok_or_else(|| RoiError::invalid_image("no image loaded"))?;

    let snapshot = session.snapshot();
    let results = analyzer.analyze_snapshot(&image, &snapshot, targets.targets())?;
    print_results(&results);
    session.merge_results(&snapshot, results.clone())?;

    let window_dimensions = session.canvas_size().map(|(cw, ch)| WindowDimensions {
        canvas_width: cw,
        canvas_height: ch,
        image_width: image.width(),
        image_height: image.height(),
    });
    let report = AnalysisReport::new(
        session.config(),
        session.image_path(),
        window_dimensions,
        targets.targets(),
        results,
    );

    match &args.out {
        Some(path) => {
            save_report(path, &report, &OutputSettings::default())?;
            println!("💾 Results saved to {}", path.display());
        }
        None => {
            let value = report.filtered(&OutputSettings::default())?;
            println!("{}", serde_json::to_string_pretty(&value)?);
        }
    }
    Ok(())
}

fn print_results(results: &[AnalysisResult]) {
    println!("=== ROI Analysis Results ===");
    for result in results {
        let source = match &result.template_info {
            Some(info) => format!(" [{}: {:?}]", info.template_name, info.roi_type),
            None => String::new(),
        };
        println!("🔲 ROI {} ({}){source}:", result.roi_num, result.name);
        match (&result.ocr_text, &result.ocr_error) {
            (Some(text), _) if !text.is_empty() => println!("    Text: {text}"),
            (_, Some(error)) => println!("    OCR Error: {error}"),
            _ => println!("    Text: None detected"),
        }
        for m in &result.target_matches {
            println!(
                "    🎯 {} ({}) at {:?}, confidence {:.2}",
                m.description, m.filename, m.location, m.confidence
            );
        }
        if let Some(error) = &result.target_match_error {
            println!("    {error}");
        }
    }
}

fn create_template(name: &str, args: &Args) -> RoiResult<()> {
    let image_path = require_image(args)?;
    let mut session = Session::new(args.analysis_config());
    session.load_image(image_path)?;
    let (width, height) = args
        .canvas
        .or_else(|| session.image_dimensions())
        .unwrap_or((0, 0));

    let mut builder = TemplateBuilder::new(name)
        .image_path(image_path)
        .window_size(width, height)
        .match_method(args.method)
        .match_threshold(args.threshold);

    let fixed = args.rois.iter().map(|r| (r, true));
    let matched = args.matched_rois.iter().map(|r| (r, false));
    for (roi, is_fixed) in fixed.chain(matched) {
        let num = session.add_roi(roi.rect, roi.name.clone())?;
        if let Some(added) = session.rois().iter().find(|r| r.roi_num == num) {
            builder = builder.session_roi(added, is_fixed);
        }
    }
    for (i, region) in args.references.iter().enumerate() {
        builder = builder.reference_region(region_name(region, i), region.rect);
    }

    let template = builder.build()?;
    let mut store = TemplateStore::open(&args.templates_dir)?;
    let path = store.save(template)?;
    println!("✅ Template '{name}' saved to {}", path.display());
    Ok(())
}

fn region_name(region: &NamedRect, index: usize) -> String {
    region
        .name
        .clone()
        .unwrap_or_else(|| format!("Region {}", index + 1))
}

fn monitor(args: &Args) -> RoiResult<()> {
    let mut session = open_session(args)?;
    add_cli_rois(&mut session, args)?;
    let targets = load_targets(args)?;
    let analyzer = new_analyzer(&session);
    let image_path: PathBuf = require_image(args)?.to_path_buf();

    let runtime = tokio::runtime::Runtime::new().map_err(|source| RoiError::Io {
        path: PathBuf::from("<tokio runtime>"),
        source,
    })?;

    runtime.block_on(async move {
        let (cmd_tx, cmd_rx, event_tx, mut event_rx) = create_monitor_channels();
        let mut monitor = RoiMonitor::new(
            FileFrameSource::new(&image_path),
            analyzer,
            session.snapshot(),
            targets.targets().to_vec(),
            cmd_rx,
            event_tx,
        )
        .with_interval(Duration::from_millis(args.interval_ms));
        if let Some(dir) = &args.out {
            monitor = monitor.with_output_dir(dir);
        }
        let handle = tokio::spawn(monitor.run());

        cmd_tx
            .send(MonitorCommand::Start)
            .await
            .map_err(|_| RoiError::ChannelClosed)?;
        println!("🎥 Monitoring {} (interval {}ms)", image_path.display(), args.interval_ms);

        let deadline = args
            .timeout_secs
            .map(|secs| Instant::now() + Duration::from_secs(secs));
        loop {
            let event = match deadline {
                Some(deadline) => match tokio::time::timeout_at(deadline, event_rx.recv()).await {
                    Ok(event) => event,
                    Err(_) => {
                        println!("⏰ Timeout reached, stopping monitor");
                        break;
                    }
                },
                None => event_rx.recv().await,
            };
            match event {
                Some(MonitorEvent::FrameAnalyzed {
                    frame_index,
                    results,
                    ..
                }) => {
                    println!("🖼️ Frame {frame_index}");
                    print_results(&results);
                }
                Some(MonitorEvent::StateChanged(state)) => println!("🎥 Monitor state: {state:?}"),
                Some(MonitorEvent::IntervalUpdate(ms)) => println!("⏱️ Interval now {ms}ms"),
                Some(MonitorEvent::Error(message)) => eprintln!("❌ {message}"),
                None => break,
            }
        }

        let _ = cmd_tx.send(MonitorCommand::Shutdown).await;
        // keep the event channel drained until the monitor exits
        let drain = tokio::spawn(async move { while event_rx.recv().await.is_some() {} });
        handle.await??;
        let _ = drain.await;
        Ok(())
    })
}
