//! End-to-end matching and generation scenarios.

use waypoint_router::{
    cache, GenerateError, GenerateParams, MatchError, MatchRequest, ReferenceType, Route,
    RouteTable, Router, RouterError, RouterOptions,
};

fn request(method: &str, path: &str) -> MatchRequest {
    MatchRequest::new(method, path)
}

fn match_error(router: &Router, request: &MatchRequest) -> MatchError {
    match router.match_request(request) {
        Err(RouterError::Match(err)) => err,
        other => panic!("expected a match error, got {other:?}"),
    }
}

#[test]
fn digit_constraint() {
    let mut router = Router::new();
    router.add(Route::get(r"/foo/{bar:\d+}", "foo")).unwrap();

    let matched = router.match_request(&request("GET", "/foo/123")).unwrap();
    assert_eq!(matched.arguments().get("bar"), Some("123"));

    assert!(matches!(
        match_error(&router, &request("GET", "/foo/abc")),
        MatchError::NotFound { .. }
    ));
}

#[test]
fn defaulted_placeholder_is_generated() {
    let mut router = Router::new();
    router.add(Route::get("/foo/{bar=0}", "foo").name("foo")).unwrap();

    let uri = router
        .generate("foo", &GenerateParams::new(), ReferenceType::AbsolutePath)
        .unwrap();
    assert_eq!(uri.to_string(), "/foo/0");
}

#[test]
fn ping_method_not_allowed() {
    let mut router = Router::new();
    router
        .add(Route::with_methods(["GET", "HEAD"], "/ping", "ping"))
        .unwrap();

    let err = match_error(&router, &request("POST", "/ping"));
    match &err {
        MatchError::MethodNotAllowed { allowed, path, .. } => {
            assert_eq!(path, "/ping");
            assert_eq!(allowed.iter().map(String::as_str).collect::<Vec<_>>(), ["GET", "HEAD"]);
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(err.status_code(), http::StatusCode::METHOD_NOT_ALLOWED);
    assert_eq!(err.allow_header().as_deref(), Some("GET, HEAD"));
}

#[test]
fn static_beats_dynamic_in_either_order() {
    for static_first in [false, true] {
        let mut router = Router::new();
        let dynamic = Route::get("/a/{x}", "dynamic");
        let fixed = Route::get("/a/fixed", "static");
        if static_first {
            router.add(fixed).unwrap();
            router.add(dynamic).unwrap();
        } else {
            router.add(dynamic).unwrap();
            router.add(fixed).unwrap();
        }

        let matched = router.match_request(&request("GET", "/a/fixed")).unwrap();
        assert_eq!(matched.route().handler(), "static");
    }
}

#[test]
fn second_route_wins_on_its_method() {
    let mut router = Router::new();
    router.add(Route::get("/users/{id}", "show")).unwrap();
    router.add(Route::patch("/users/{id}", "edit")).unwrap();

    let matched = router.match_request(&request("PATCH", "/users/4")).unwrap();
    assert_eq!(matched.route().handler(), "edit");
}

#[test]
fn method_is_checked_before_scheme() {
    let mut router = Router::new();
    router
        .add(Route::post("/checkout", "checkout").scheme("https"))
        .unwrap();

    let err = match_error(&router, &request("GET", "/checkout").with_scheme("http"));
    assert!(matches!(err, MatchError::MethodNotAllowed { .. }));

    let err = match_error(&router, &request("POST", "/checkout").with_scheme("http"));
    assert!(matches!(err, MatchError::SchemeNotAllowed { .. }));
    assert_eq!(err.status_code(), http::StatusCode::BAD_REQUEST);
}

#[test]
fn optional_group_collapse() {
    let mut router = Router::new();
    router.add(Route::get("/foo[/{bar}]", "foo").name("foo")).unwrap();

    let uri = router
        .generate("foo", &GenerateParams::new(), ReferenceType::AbsolutePath)
        .unwrap();
    assert_eq!(uri.to_string(), "/foo");

    let bare = router.match_request(&request("GET", "/foo")).unwrap();
    assert!(!bare.arguments().contains("bar"));

    let full = router.match_request(&request("GET", "/foo/anything")).unwrap();
    assert_eq!(full.arguments().get("bar"), Some("anything"));
}

#[test]
fn reserved_characters_round_trip() {
    let mut router = Router::new();
    router.add(Route::get("/q/{term}", "search").name("search")).unwrap();

    for term in ["a?b", "a#b", "100%", "%3F", "two words"] {
        let uri = router
            .generate(
                "search",
                &GenerateParams::new().arg("term", term),
                ReferenceType::AbsolutePath,
            )
            .unwrap();
        let matched = router
            .match_request(&request("GET", &uri.to_string()))
            .unwrap();
        assert_eq!(matched.arguments().get("term"), Some(term), "{uri}");
    }
}

#[test]
fn tenant_hosts() {
    let mut router = Router::new();
    router
        .add(
            Route::get("/", "tenant.home")
                .host("{tenant:lower}.example.com")
                .name("tenant.home"),
        )
        .unwrap();
    router.add(Route::get("/", "home")).unwrap();

    let matched = router
        .match_request(&request("GET", "/").with_host("acme.example.com"))
        .unwrap();
    assert_eq!(matched.route().handler(), "tenant.home");
    assert_eq!(matched.arguments().get("tenant"), Some("acme"));

    let matched = router
        .match_request(&request("GET", "/").with_host("localhost"))
        .unwrap();
    assert_eq!(matched.route().handler(), "home");

    let uri = router
        .generate(
            "tenant.home",
            &GenerateParams::new().arg("tenant", "globex"),
            ReferenceType::NetworkPath,
        )
        .unwrap();
    assert_eq!(uri.to_string(), "//globex.example.com/");

    let err = router
        .generate(
            "tenant.home",
            &GenerateParams::new().arg("tenant", "globex2"),
            ReferenceType::NetworkPath,
        )
        .unwrap_err();
    assert!(matches!(
        err,
        RouterError::Generate(GenerateError::InvalidParameter { .. })
    ));
}

#[test]
fn custom_alias_from_options() {
    let options = RouterOptions::default().with_alias("sku", "[A-Z]{3}-[0-9]{4}");
    let mut router = Router::with_options(options);
    router.add(Route::get("/products/{sku:sku}", "product")).unwrap();

    assert!(router
        .match_request(&request("GET", "/products/ABC-1234"))
        .is_ok());
    assert!(router
        .match_request(&request("GET", "/products/abc-1234"))
        .is_err());
}

#[test]
fn external_requirements() {
    let mut router = Router::new();
    router
        .add(
            Route::get("/posts/{year}/{slug}", "post")
                .assert("year", "year")
                .assert("slug", "slug"),
        )
        .unwrap();

    assert!(router
        .match_request(&request("GET", "/posts/2024/hello-world"))
        .is_ok());
    assert!(router
        .match_request(&request("GET", "/posts/24/hello-world"))
        .is_err());
}

#[test]
fn large_tables_span_many_chunks() {
    let mut router = Router::with_options(RouterOptions::default().with_chunk_size(3));
    for i in 0..100 {
        router
            .add(Route::get(format!("/api/items/{{id:int}}/v{i}"), format!("item{i}")))
            .unwrap();
    }
    router.add(Route::get("/api/{rest:*}", "fallback")).unwrap();

    let matched = router
        .match_request(&request("GET", "/api/items/5/v77"))
        .unwrap();
    assert_eq!(matched.route().handler(), "item77");

    let matched = router
        .match_request(&request("GET", "/api/items/x/v77"))
        .unwrap();
    assert_eq!(matched.route().handler(), "fallback");
    assert_eq!(matched.arguments().get("rest"), Some("items/x/v77"));
}

#[test]
fn cached_table_matches_like_fresh_build() {
    let mut table = RouteTable::new();
    table.add(Route::get("/", "home")).unwrap();
    table.add(Route::get("/blog[/{page=1}]", "blog")).unwrap();
    table.add(Route::post("/blog", "blog.create").scheme("https")).unwrap();
    table.add(Route::get("/blog/{slug:slug}", "blog.post")).unwrap();

    let built = table.build().unwrap();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("routes.json");
    cache::save(&built, &path).unwrap();
    let loaded = cache::load(&path).unwrap();

    for (method, path, scheme) in [
        ("GET", "/", "http"),
        ("GET", "/blog", "http"),
        ("GET", "/blog/3", "http"),
        ("GET", "/blog/hello-world", "http"),
        ("POST", "/blog", "http"),
        ("POST", "/blog", "https"),
        ("PUT", "/blog", "http"),
        ("GET", "/missing", "http"),
    ] {
        let request = request(method, path).with_scheme(scheme);
        let fresh = built.match_request(&request);
        let cached = loaded.match_request(&request);
        match (fresh, cached) {
            (Ok(a), Ok(b)) => {
                assert_eq!(a.id(), b.id());
                assert_eq!(a.arguments(), b.arguments());
            }
            (Err(a), Err(b)) => assert_eq!(a, b),
            (a, b) => panic!("{method} {path}: fresh {a:?} vs cached {b:?}"),
        }
    }
}
