use gloo_net::http::Request;
use gloo_timers::future::TimeoutFuture;
use js_sys::{encode_uri_component, Array, Function, Math, Object, Reflect};
use std::rc::Rc;
use wasm_bindgen::{JsCast, JsValue};
use wasm_bindgen_futures::spawn_local;
use web_sys::{
    window, Element, HtmlElement, MouseEvent, PointerEvent, ScrollBehavior, ScrollIntoViewOptions,
};
use yew::prelude::*;

use crate::cards::{card_placement, CardLayers, CardPlacement, DragBounds, DragSession, Rect};
use crate::nav::{section_id, TabHighlight, TABS};
use crate::photos::{
    FetchError, Gallery, GalleryAction, SearchQuery, SearchResponse, PRIMARY_QUERY,
    REFRESH_SETTLE_MS, TRAIL_QUERY,
};
use crate::spring::SpringEasing;
use crate::trail::{
    AnimationPlan, Keyframe, Point, TrailConfig, TrailSpawn, TrailState, DEFAULT_RENDER_DISTANCE,
    DEFAULT_ROTATION_RANGE, ENTRY_EASING_STOPS,
};

const PHOTO_API_URL: &str = match option_env!("PHOTO_API_URL") {
    Some(url) => url,
    None => "https://api.pexels.com/v1/search",
};
const PHOTO_API_KEY: Option<&str> = option_env!("PHOTO_API_KEY");

fn search_url(query: SearchQuery) -> String {
    let term = encode_uri_component(query.term)
        .as_string()
        .unwrap_or_else(|| query.term.to_string());
    let separator = if PHOTO_API_URL.contains('?') { '&' } else { '?' };

    format!(
        "{PHOTO_API_URL}{separator}query={term}&per_page={}",
        query.per_page
    )
}

async fn fetch_batch(query: SearchQuery) -> Result<Vec<String>, FetchError> {
    let mut request = Request::get(&search_url(query));
    if let Some(key) = PHOTO_API_KEY {
        request = request.header("Authorization", key);
    }

    let response = request
        .send()
        .await
        .map_err(|error| FetchError::Transport(error.to_string()))?;

    if !response.ok() {
        return Err(FetchError::Status(response.status()));
    }

    let payload = response
        .json::<SearchResponse>()
        .await
        .map_err(|error| FetchError::Payload(error.to_string()))?;

    payload.into_batch()
}

impl Reducible for Gallery {
    type Action = GalleryAction;

    fn reduce(self: Rc<Self>, action: Self::Action) -> Rc<Self> {
        let mut next = (*self).clone();
        match next.apply(action) {
            Ok(()) => Rc::new(next),
            Err(error) => {
                log::error!("gallery update skipped: {error}");
                self
            }
        }
    }
}

fn fetch_primary(gallery: UseReducerDispatcher<Gallery>) {
    gallery.dispatch(GalleryAction::RefreshStarted);

    spawn_local(async move {
        let batch = fetch_batch(PRIMARY_QUERY).await;
        gallery.dispatch(GalleryAction::PrimaryLoaded {
            batch,
            sample: Math::random(),
        });

        TimeoutFuture::new(REFRESH_SETTLE_MS).await;
        gallery.dispatch(GalleryAction::RefreshSettled);
    });
}

fn fetch_trail(gallery: UseReducerDispatcher<Gallery>) {
    spawn_local(async move {
        let batch = fetch_batch(TRAIL_QUERY).await;
        gallery.dispatch(GalleryAction::TrailLoaded(batch));
    });
}

fn client_rect(element: &Element) -> Rect {
    let rect = element.get_bounding_client_rect();
    Rect {
        left: rect.left(),
        top: rect.top(),
        width: rect.width(),
        height: rect.height(),
    }
}

fn pointer_point(event: &MouseEvent) -> Point {
    Point::new(f64::from(event.client_x()), f64::from(event.client_y()))
}

fn scroll_to_section(id: &str) {
    let Some(element) = window()
        .and_then(|w| w.document())
        .and_then(|d| d.get_element_by_id(id))
    else {
        return;
    };

    let options = ScrollIntoViewOptions::new();
    options.set_behavior(ScrollBehavior::Smooth);
    element.scroll_into_view_with_scroll_into_view_options(&options);
}

fn keyframe_object(frame: &Keyframe) -> Object {
    let keyframe = Object::new();
    let _ = Reflect::set(
        &keyframe,
        &JsValue::from_str("opacity"),
        &JsValue::from_f64(frame.opacity),
    );
    if let Some(transform) = frame.transform.as_deref() {
        let _ = Reflect::set(
            &keyframe,
            &JsValue::from_str("transform"),
            &JsValue::from_str(transform),
        );
    }
    keyframe
}

fn timing_object(plan: &AnimationPlan) -> Object {
    let timing = Object::new();
    let fields = [
        ("duration", JsValue::from_f64(plan.duration_ms)),
        ("delay", JsValue::from_f64(plan.delay_ms)),
        ("easing", JsValue::from_str(&plan.easing)),
        ("fill", JsValue::from_str("forwards")),
    ];
    for (key, value) in fields {
        let _ = Reflect::set(&timing, &JsValue::from_str(key), &value);
    }
    timing
}

/// Starts `plan` through `Element.animate`. Returns false when the Web Animations API
/// is missing or rejects the keyframes.
fn play(element: &HtmlElement, plan: &AnimationPlan) -> bool {
    let element_js: &JsValue = element.as_ref();
    let Ok(animate) = Reflect::get(element_js, &JsValue::from_str("animate")) else {
        return false;
    };
    let Some(animate) = animate.dyn_ref::<Function>() else {
        return false;
    };

    let keyframes = plan
        .keyframes
        .iter()
        .map(keyframe_object)
        .collect::<Array>();

    animate
        .call2(element_js, &keyframes, &timing_object(plan))
        .is_ok()
}

fn apply_keyframe(element: &HtmlElement, frame: &Keyframe) {
    let style = element.style();
    let _ = style.set_property("opacity", &frame.opacity.to_string());
    if let Some(transform) = frame.transform.as_deref() {
        let _ = style.set_property("transform", transform);
    }
}

fn render_trail_image(container: &HtmlElement, spawn: &TrailSpawn, easing: &SpringEasing) {
    let selector = format!("[data-mouse-move-index=\"{}\"]", spawn.slot);
    let Some(image) = container
        .query_selector(&selector)
        .ok()
        .flatten()
        .and_then(|element| element.dyn_into::<HtmlElement>().ok())
    else {
        return;
    };

    let origin = client_rect(container);
    let local = spawn.position.offset_by(Point::new(origin.left, origin.top));
    let style = image.style();
    let _ = style.set_property("top", &format!("{:.2}px", local.y));
    let _ = style.set_property("left", &format!("{:.2}px", local.x));
    let _ = style.set_property("z-index", &spawn.z_index.to_string());

    let entry = spawn.entry_animation(easing);
    if !play(&image, &entry) {
        if let Some(settled) = entry.keyframes.last() {
            apply_keyframe(&image, settled);
        }
        return;
    }

    play(&image, &spawn.exit_animation());
}

#[derive(Properties, PartialEq)]
struct TabProps {
    label: AttrValue,
    on_hover: Callback<(f64, f64)>,
}

#[function_component(Tab)]
fn tab(props: &TabProps) -> Html {
    let node = use_node_ref();

    let onmouseenter = {
        let node = node.clone();
        let on_hover = props.on_hover.clone();
        Callback::from(move |_: MouseEvent| {
            if let Some(element) = node.cast::<HtmlElement>() {
                on_hover.emit((
                    f64::from(element.offset_left()),
                    f64::from(element.offset_width()),
                ));
            }
        })
    };

    let onclick = {
        let target = section_id(&props.label);
        Callback::from(move |_: MouseEvent| scroll_to_section(&target))
    };

    html! {
        <li ref={node} class="slide-tab" onmouseenter={onmouseenter} onclick={onclick}>
            {props.label.clone()}
        </li>
    }
}

#[function_component(SlideTabs)]
fn slide_tabs() -> Html {
    let highlight = use_state(TabHighlight::default);

    let on_hover = {
        let highlight = highlight.clone();
        Callback::from(move |(left, width): (f64, f64)| {
            highlight.set(TabHighlight::hovered(left, width));
        })
    };

    let onmouseleave = {
        let highlight = highlight.clone();
        Callback::from(move |_: MouseEvent| highlight.set((*highlight).faded()))
    };

    html! {
        <ul class="slide-tabs" onmouseleave={onmouseleave}>
            { for TABS.iter().map(|label| html! {
                <Tab key={*label} label={*label} on_hover={on_hover.clone()} />
            }) }
            <li class="slide-tabs-cursor" aria-hidden="true" style={highlight.style()} />
        </ul>
    }
}

#[derive(Properties, PartialEq)]
struct HeroProps {
    feature: Option<AttrValue>,
    has_feature: bool,
    on_refresh: Callback<MouseEvent>,
}

#[function_component(Hero)]
fn hero(props: &HeroProps) -> Html {
    let visible = props.feature.clone();

    html! {
        <section id="home" class="hero">
            <SlideTabs />

            if let Some(url) = visible.clone() {
                <div
                    key={url.to_string()}
                    class="hero-backdrop"
                    style={format!("background-image: url('{url}');")}
                />
            }

            <div class="hero-grid">
                <div class="hero-copy">
                    <h1 class="hero-title">
                        {"Discover "}<span class="accent">{"Aesthetic"}</span>{" Beauty"}
                    </h1>
                    <p class="hero-lede">
                        {"Handpicked visuals from creative minds across the globe, randomized every time."}
                    </p>
                    <button class="refresh-button" type="button" onclick={props.on_refresh.clone()}>
                        {"change background"}
                    </button>
                </div>

                if props.has_feature {
                    <div class="hero-card" onclick={props.on_refresh.clone()}>
                        if let Some(url) = visible {
                            <img
                                key={format!("{url}-card")}
                                class="hero-card-image"
                                src={url.clone()}
                                alt="Aesthetic Random"
                            />
                        }
                    </div>
                }
            </div>
        </section>
    }
}

#[derive(Properties, PartialEq)]
struct CardProps {
    container: NodeRef,
    src: AttrValue,
    alt: AttrValue,
    placement: CardPlacement,
    z_index: i32,
    on_raise: Callback<AttrValue>,
}

#[function_component(Card)]
fn card(props: &CardProps) -> Html {
    let node = use_node_ref();
    let offset = use_state(Point::default);
    let settling = use_state(|| false);
    let session = use_mut_ref(|| None::<DragSession>);

    let onpointerdown = {
        let node = node.clone();
        let container = props.container.clone();
        let src = props.src.clone();
        let on_raise = props.on_raise.clone();
        let offset = offset.clone();
        let settling = settling.clone();
        let session = session.clone();
        Callback::from(move |event: PointerEvent| {
            on_raise.emit(src.clone());

            let (Some(card), Some(area)) = (node.cast::<HtmlElement>(), container.cast::<HtmlElement>())
            else {
                return;
            };

            event.prevent_default();
            let _ = card.set_pointer_capture(event.pointer_id());

            let bounds = DragBounds::new(client_rect(&area), client_rect(&card), *offset);
            session.replace(Some(DragSession::start(
                event.pointer_id(),
                pointer_point(&event),
                *offset,
                bounds,
            )));
            settling.set(false);
        })
    };

    let onpointermove = {
        let offset = offset.clone();
        let session = session.clone();
        Callback::from(move |event: PointerEvent| {
            let current = *session.borrow();
            if let Some(active) = current.filter(|active| active.pointer_id() == event.pointer_id()) {
                offset.set(active.drag_to(pointer_point(&event)));
            }
        })
    };

    let end_drag = {
        let offset = offset.clone();
        let settling = settling.clone();
        Callback::from(move |event: PointerEvent| {
            let current = *session.borrow();
            let Some(active) = current.filter(|active| active.pointer_id() == event.pointer_id()) else {
                return;
            };

            session.replace(None);
            offset.set(active.release(pointer_point(&event)));
            settling.set(true);
        })
    };

    let placement = props.placement;
    let style = format!(
        "top: {:.1}%; left: {:.1}%; z-index: {}; transform: translate3d({:.2}px, {:.2}px, 0) rotate({:.1}deg);",
        placement.top_percent,
        placement.left_percent,
        props.z_index,
        offset.x,
        offset.y,
        placement.rotate_deg,
    );

    html! {
        <img
            ref={node}
            class={classes!("drag-card", (*settling).then_some("is-settling"))}
            style={style}
            src={props.src.clone()}
            alt={props.alt.clone()}
            draggable="false"
            onpointerdown={onpointerdown}
            onpointermove={onpointermove}
            onpointerup={end_drag.clone()}
            onpointercancel={end_drag}
        />
    }
}

#[derive(Properties, PartialEq)]
struct CardsProps {
    images: Vec<String>,
}

#[function_component(Cards)]
fn cards(props: &CardsProps) -> Html {
    let container = use_node_ref();
    let layers = use_state_eq(CardLayers::default);

    {
        let layers = layers.clone();
        use_effect_with(props.images.clone(), move |images| {
            let mut next = (*layers).clone();
            next.retain_keys(images.iter().map(String::as_str));
            layers.set(next);
            || ()
        });
    }

    let on_raise = {
        let layers = layers.clone();
        Callback::from(move |key: AttrValue| {
            let mut next = (*layers).clone();
            next.raise(&key);
            layers.set(next);
        })
    };

    html! {
        <div class="card-stack" ref={container.clone()}>
            { for props.images.iter().enumerate().map(|(index, src)| html! {
                <Card
                    key={src.clone()}
                    container={container.clone()}
                    src={src.clone()}
                    alt={format!("Random image {index}")}
                    placement={card_placement(index)}
                    z_index={layers.level(src)}
                    on_raise={on_raise.clone()}
                />
            }) }
        </div>
    }
}

#[derive(Properties, PartialEq)]
struct MouseImageTrailProps {
    images: Vec<String>,
    render_distance: f64,
    rotation_range: f64,
    #[prop_or_default]
    children: Html,
}

#[function_component(MouseImageTrail)]
fn mouse_image_trail(props: &MouseImageTrailProps) -> Html {
    let scope = use_node_ref();
    let trail = use_mut_ref(TrailState::new);
    let config = TrailConfig {
        render_distance: props.render_distance,
        rotation_range: props.rotation_range,
        ..TrailConfig::default()
    };
    let easing = use_memo(config.spring, |spring| spring.easing(ENTRY_EASING_STOPS));

    let onmousemove = {
        let scope = scope.clone();
        let pool_size = props.images.len();
        Callback::from(move |event: MouseEvent| {
            let spawn = trail
                .borrow_mut()
                .pointer_moved(&config, pool_size, pointer_point(&event), Math::random);

            if let (Some(spawn), Some(container)) = (spawn, scope.cast::<HtmlElement>()) {
                render_trail_image(&container, &spawn, &easing);
            }
        })
    };

    html! {
        <div ref={scope} class="trail-scope" onmousemove={onmousemove}>
            {props.children.clone()}
            { for props.images.iter().enumerate().map(|(index, src)| html! {
                <img
                    key={index}
                    class="trail-image"
                    src={src.clone()}
                    alt={format!("Mouse move image {index}")}
                    data-mouse-move-index={index.to_string()}
                />
            }) }
        </div>
    }
}

#[function_component(App)]
fn app() -> Html {
    let gallery = use_reducer(Gallery::default);

    {
        let dispatcher = gallery.dispatcher();
        use_effect_with((), move |_| {
            fetch_primary(dispatcher.clone());
            fetch_trail(dispatcher);
            || ()
        });
    }

    let on_refresh = {
        let dispatcher = gallery.dispatcher();
        Callback::from(move |_: MouseEvent| fetch_primary(dispatcher.clone()))
    };

    html! {
        <div class="page">
            <Hero
                feature={gallery.visible_feature().map(|url| AttrValue::from(url.to_string()))}
                has_feature={gallery.feature.is_some()}
                on_refresh={on_refresh}
            />

            <section id="shuffle" class="shuffle">
                <h2 class="shuffle-title">
                    {"goooooo "}<span class="accent">{"Shuffle"}</span>
                </h2>
                <Cards images={gallery.card_stack().to_vec()} />
            </section>

            <MouseImageTrail
                images={gallery.trail.clone()}
                render_distance={DEFAULT_RENDER_DISTANCE}
                rotation_range={DEFAULT_ROTATION_RANGE}
            >
                <section class="trail-stage">
                    <p class="trail-hint">
                        <span aria-hidden="true">{"➚"}</span>
                        <span>{"Hover me"}</span>
                    </p>
                </section>
            </MouseImageTrail>
        </div>
    }
}

pub fn run() {
    console_error_panic_hook::set_once();
    console_log::init_with_level(log::Level::Info).ok();

    yew::Renderer::<App>::with_root(
        window()
            .and_then(|w| w.document())
            .and_then(|d| d.get_element_by_id("app"))
            .expect("missing #app mount point"),
    )
    .render();
}
