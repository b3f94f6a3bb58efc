mod utils;
#[allow(unused)]
use utils::*;

use stampede::prelude::*;
use std::time::Duration;

fn json_placeholder_protocol() -> Protocol {
    Protocol::new("https://jsonplaceholder.typicode.com")
        .accept_header("application/json")
        .content_type_header("application/json")
}

fn reqres_protocol() -> Protocol {
    Protocol::new("https://reqres.in")
        .accept_header("application/json")
        .content_type_header("application/json")
        .user_agent_header("Stampede Performance Test")
}

fn create_post() -> ChainBuilder {
    exec(
        http("[POST] Create Post")
            .post("/posts")
            .body(r##"{"title": "#{title}", "body": "#{body}", "userId": #{userId}}"##)
            .check(Check::status_in([201, 200]))
            .check(Check::json_path("$.id").save_as("newPostId")),
    )
}

#[tokio::test(start_paused = true)]
async fn full_crud_flow_passes_global_assertions() -> anyhow::Result<()> {
    init();
    let api = ApiStub::new();

    let full_crud = scenario("Full CRUD with JSONPlaceholder")
        .feed(Feeder::random(posts_records()))
        .exec(http("[GET] All Posts").get("/posts").check(Check::status_is(200)))
        .pause(Duration::from_secs(1))
        .exec(http("[GET] Post by ID").get("/posts/#{id}").check(Check::status_is(200)))
        .pause(Duration::from_secs(1))
        .exec(create_post())
        .pause(Duration::from_secs(1))
        .exec(
            http("[PUT] Update Post")
                .put("/posts/#{id}")
                .body(r##"{"id": #{id}, "title": "#{title}", "body": "#{body}", "userId": #{userId}}"##)
                .check(Check::status_is(200)),
        )
        .pause(Duration::from_secs(1))
        .exec(
            http("[DELETE] Delete Post")
                .delete("/posts/#{id}")
                .check(Check::status_in([200, 204])),
        );

    let report = Simulation::new()
        .population(
            full_crud
                .inject(InjectionProfile::ramp_users(3, Duration::from_secs(10)))
                .protocols(json_placeholder_protocol()),
        )
        .assertion(Assertion::MaxResponseTimeLt(Duration::from_millis(1500)))
        .assertion(Assertion::FailedRequestsPercentLt(5.))
        .run(api.clone())
        .await?;

    assert_eq!(report.statistics.total_requests, 15);
    assert_eq!(report.statistics.failed_requests, 0);
    assert_eq!(report.users.completed, 3);
    assert!(report.passed());
    assert_eq!(report.exit_code(), 0);
    Ok(())
}

#[tokio::test]
async fn single_get_yields_one_successful_outcome() -> anyhow::Result<()> {
    init();
    let api = ApiStub::new();

    let report = Simulation::new()
        .population(
            scenario("Get Posts")
                .exec(http("[GET] All Posts").get("/posts").check(Check::status_is(200)))
                .inject(InjectionProfile::at_once_users(1))
                .protocols(json_placeholder_protocol()),
        )
        .assertion(Assertion::FailedRequestsPercentLt(5.))
        .run(api)
        .await?;

    assert_eq!(report.outcomes.len(), 1);
    assert_eq!(report.outcomes[0].status, RequestStatus::Ok(200));
    assert!(report.assertions.iter().all(|a| a.passed));
    Ok(())
}

#[tokio::test]
async fn repeated_create_feeds_fresh_data_each_iteration() -> anyhow::Result<()> {
    init();
    let api = ApiStub::new();
    let feeder = Feeder::random(posts_records());

    let report = Simulation::new()
        .population(
            scenario("Repeat 3 times with Random Data")
                .repeat(3, feed(feeder).exec(create_post()))
                .inject(InjectionProfile::at_once_users(1))
                .protocols(json_placeholder_protocol()),
        )
        .run(api.clone())
        .await?;

    assert_eq!(report.statistics.total_requests, 3);
    let bodies = api.bodies();
    assert_eq!(bodies.len(), 3);
    for body in &bodies {
        let json: serde_json::Value = serde_json::from_str(body)?;
        assert!(json.get("title").is_some());
        assert!(json.get("userId").is_some());
    }
    Ok(())
}

#[tokio::test]
async fn circular_feeder_distributes_rows_across_users() -> anyhow::Result<()> {
    init();
    let api = ApiStub::new();

    let report = Simulation::new()
        .population(
            scenario("3 Users Circular Feeder")
                .feed(Feeder::circular(posts_records()))
                .exec(create_post())
                .inject(InjectionProfile::at_once_users(3))
                .protocols(json_placeholder_protocol()),
        )
        .run(api.clone())
        .await?;

    assert_eq!(report.users.completed, 3);
    let mut bodies = api.bodies();
    bodies.sort();
    // Each user drew a distinct row.
    assert_eq!(bodies.len(), 3);
    assert!(bodies[0].contains("t1") && bodies[1].contains("t2") && bodies[2].contains("t3"));
    Ok(())
}

#[tokio::test]
async fn create_post_body_is_templated_exactly() -> anyhow::Result<()> {
    init();
    let api = ApiStub::new();
    let records = Feeder::records_from_json(&serde_json::json!([
        {"title": "a", "body": "b", "userId": 1},
    ]))
    .expect("static records");

    Simulation::new()
        .population(
            scenario("Create One Post")
                .feed(Feeder::sequential(records))
                .exec(create_post())
                .inject(InjectionProfile::at_once_users(1))
                .protocols(json_placeholder_protocol()),
        )
        .run(api.clone())
        .await?;

    let bodies = api.bodies();
    let json: serde_json::Value = serde_json::from_str(&bodies[0])?;
    assert_eq!(json, serde_json::json!({"title": "a", "body": "b", "userId": 1}));
    Ok(())
}

#[tokio::test]
async fn weighted_actions_follow_configured_probabilities() -> anyhow::Result<()> {
    init();
    let api = ApiStub::new();

    let report = Simulation::new()
        .population(
            scenario("Random User Actions with Probabilities")
                .feed(Feeder::random(posts_records()))
                .random_switch([
                    (70., create_post()),
                    (
                        20.,
                        exec(
                            http("[PUT] Update Post")
                                .put("/posts/#{id}")
                                .body(r#"{"id": #{id}}"#)
                                .check(Check::status_is(200)),
                        ),
                    ),
                    (
                        10.,
                        exec(
                            http("[DELETE] Delete Post")
                                .delete("/posts/#{id}")
                                .check(Check::status_in([200, 204])),
                        ),
                    ),
                ])
                .inject(InjectionProfile::at_once_users(1000))
                .protocols(json_placeholder_protocol()),
        )
        .run(api.clone())
        .await?;

    assert_eq!(report.statistics.total_requests, 1000);
    let requests = api.requests.lock().unwrap();
    let share = |method: Method| {
        requests.iter().filter(|r| r.method == method).count() as f64 / requests.len() as f64
    };
    assert!((share(Method::Post) - 0.70).abs() < 0.05);
    assert!((share(Method::Put) - 0.20).abs() < 0.05);
    assert!((share(Method::Delete) - 0.10).abs() < 0.05);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn login_happens_once_then_users_are_fetched() -> anyhow::Result<()> {
    init();
    let api = ApiStub::new();
    let credentials = Feeder::circular(
        Feeder::records_from_json(&serde_json::json!([
            {"email": "eve.holt@reqres.in", "password": "cityslicka"},
        ]))
        .expect("static records"),
    );

    let login_and_get_users = scenario("ReqRes Login + Get Users")
        .feed(credentials)
        .do_if(
            |session: &Session| !session.contains("authToken"),
            exec(
                http("ReqRes Login")
                    .post("/api/login")
                    .header("x-api-key", "reqres-free-v1")
                    .body(r##"{"email": "#{email}", "password": "#{password}"}"##)
                    .check(Check::status_is(200))
                    .check(Check::json_path("$.token").save_as("authToken")),
            ),
        )
        .exec(
            http("[GET] Users")
                .get("/api/users")
                .header("authorization", "Bearer #{authToken}")
                .check(Check::status_is(200)),
        );

    let report = Simulation::new()
        .population(
            login_and_get_users
                .inject(InjectionProfile::ramp_users(3, Duration::from_secs(10)))
                .protocols(reqres_protocol()),
        )
        .assertion(Assertion::MaxResponseTimeLt(Duration::from_millis(1000)))
        .assertion(Assertion::FailedRequestsPercentLt(3.))
        .run(api.clone())
        .await?;

    assert!(report.passed());
    // Each of the 3 users logs in once and fetches users once.
    assert_eq!(report.statistics.total_requests, 6);

    let requests = api.requests.lock().unwrap();
    let fetch = requests
        .iter()
        .find(|r| r.url.ends_with("/api/users"))
        .expect("users fetched");
    assert!(fetch
        .headers
        .iter()
        .any(|(name, value)| name == "authorization" && value == "Bearer QpwL5tke4Pnpja7X4"));
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn retry_recovers_from_transient_failures() -> anyhow::Result<()> {
    init();
    let api = ApiStub::new();
    api.fail_next(2);

    let report = Simulation::new()
        .population(
            scenario("Get Posts with Retry")
                .try_max(
                    3,
                    Duration::from_secs(1),
                    exec(http("[GET] All Posts (with Retry)")
                        .get("/posts")
                        .check(Check::status_is(200)))
                    .exit_here_if_failed(),
                )
                .inject(InjectionProfile::at_once_users(1))
                .protocols(json_placeholder_protocol()),
        )
        .run(api.clone())
        .await?;

    assert_eq!(api.request_count(), 3);
    assert_eq!(report.users.completed, 1);
    assert_eq!(report.users.failed, 0);
    // Two failed attempts are still recorded as failed outcomes.
    assert_eq!(report.statistics.failed_requests, 2);
    Ok(())
}

#[tokio::test]
async fn all_populations_run_concurrently_into_one_report() -> anyhow::Result<()> {
    init();
    let api = ApiStub::new();

    let report = Simulation::new()
        .population(
            scenario("Get Posts")
                .exec(http("[GET] All Posts").get("/posts").check(Check::status_is(200)))
                .inject(InjectionProfile::at_once_users(2))
                .protocols(json_placeholder_protocol()),
        )
        .population(
            scenario("Constant Creators")
                .feed(Feeder::random(posts_records()))
                .exec(create_post())
                .inject(InjectionProfile::constant_concurrent_users(
                    2,
                    Duration::from_millis(100),
                ))
                .protocols(json_placeholder_protocol()),
        )
        .assertion(Assertion::FailedRequestsPercentLt(5.))
        .run(api)
        .await?;

    let steps: Vec<&str> = report.statistics.per_step.keys().map(String::as_str).collect();
    assert!(steps.contains(&"Get Posts / [GET] All Posts"));
    assert!(steps.contains(&"Constant Creators / [POST] Create Post"));
    assert!(report.passed());
    Ok(())
}

#[tokio::test]
async fn failing_api_violates_assertions_without_erroring() -> anyhow::Result<()> {
    init();
    let api = ApiStub::new();
    api.fail_next(usize::MAX);

    let report = Simulation::new()
        .population(
            scenario("Get Posts")
                .exec(http("[GET] All Posts").get("/posts").check(Check::status_is(200)))
                .inject(InjectionProfile::at_once_users(4))
                .protocols(json_placeholder_protocol()),
        )
        .assertion(Assertion::FailedRequestsPercentLt(5.))
        .run(api)
        .await?;

    // The run itself completes; only the verdict fails.
    assert_eq!(report.statistics.total_requests, 4);
    assert!((report.statistics.failed_percent - 100.).abs() < f64::EPSILON);
    assert!(!report.passed());
    assert_eq!(report.exit_code(), 1);
    let violated = report.assertions.iter().find(|a| !a.passed).expect("violation");
    assert_eq!(violated.measured, "100.00%");
    Ok(())
}

#[tokio::test]
async fn report_serializes_for_machine_consumption() -> anyhow::Result<()> {
    init();
    let api = ApiStub::new();

    let report = Simulation::new()
        .population(
            scenario("Get Posts")
                .exec(http("[GET] All Posts").get("/posts").check(Check::status_is(200)))
                .inject(InjectionProfile::at_once_users(1))
                .protocols(json_placeholder_protocol()),
        )
        .assertion(Assertion::FailedRequestsPercentLt(5.))
        .run(api)
        .await?;

    let json = serde_json::to_value(&report)?;
    assert_eq!(json["statistics"]["total_requests"], 1);
    assert_eq!(json["assertions"][0]["passed"], true);
    assert_eq!(json["users"]["completed"], 1);
    Ok(())
}
