//! End-to-end flow tests against a scripted caller.

mod support;

use std::sync::Arc;
use std::time::Duration;

use ivr_engine_config::Settings;
use ivr_engine_core::{CallSummary, Channel, FinalStatus, FlowConfig};
use ivr_engine_flow::FlowRunner;
use serde_json::json;
use support::{MockChannel, ScriptStep};

fn flow(value: serde_json::Value) -> FlowConfig {
    serde_json::from_value(value).expect("valid flow json")
}

async fn run(channel: Arc<MockChannel>, config: FlowConfig) -> CallSummary {
    FlowRunner::new(channel, config, Settings::default()).run().await
}

fn menu_flow() -> FlowConfig {
    flow(json!({
        "id": "ivr-1",
        "name": "Main Menu",
        "extension": "2001",
        "flow": {
            "startNode": "welcome",
            "nodes": {
                "welcome": {"id": "welcome", "type": "play", "prompt": "welcome", "next": "ask"},
                "ask": {
                    "id": "ask", "type": "collect", "prompt": "enter_choice",
                    "maxDigits": 4, "variable": "choice", "next": "route"
                },
                "route": {
                    "id": "route", "type": "branch", "variable": "choice",
                    "branches": {"1": "sales", "2": "support"}, "default": "operator"
                },
                "sales": {"id": "sales", "type": "play", "prompt": "sales_queue", "next": "bye"},
                "support": {"id": "support", "type": "play", "prompt": "support_queue", "next": "bye"},
                "operator": {"id": "operator", "type": "play", "prompt": "operator", "next": "bye"},
                "bye": {"id": "bye", "type": "hangup"}
            },
            "captureVariables": [{"name": "choice", "label": "Menu Choice"}]
        }
    }))
}

#[tokio::test(start_paused = true)]
async fn collected_digits_route_through_branch_to_hangup() {
    let channel = Arc::new(MockChannel::new(1).with_script(vec![
        ScriptStep::Wait(Duration::from_secs(3)),
        ScriptStep::Press('1'),
        ScriptStep::Press('#'),
    ]));

    let summary = run(Arc::clone(&channel), menu_flow()).await;

    assert_eq!(summary.final_status, FinalStatus::FlowCompleted);
    assert!(summary.completed_flow);
    assert_eq!(
        summary.node_history,
        ["welcome", "ask", "route", "sales", "bye"]
    );
    assert_eq!(summary.dtmf_inputs.len(), 1);
    assert_eq!(summary.dtmf_inputs[0].node, "ask");
    // the terminator is never part of the stored digits
    assert_eq!(summary.dtmf_inputs[0].digits, "1");
    assert_eq!(
        summary.variables["choice"],
        json!({"value": "1", "label": "Menu Choice"})
    );
    assert!(channel.hung_up());
    let played = channel.played();
    assert!(played.contains(&"ar/welcome".to_string()));
    assert!(played.contains(&"ar/sales_queue".to_string()));
}

#[tokio::test(start_paused = true)]
async fn barged_digit_is_queued_for_the_branch() {
    let config = flow(json!({
        "id": "ivr-2",
        "name": "Quick Menu",
        "extension": "2002",
        "flow": {
            "startNode": "menu",
            "nodes": {
                "menu": {"id": "menu", "type": "play", "prompt": "main_menu", "next": "route"},
                "route": {
                    "id": "route", "type": "branch", "variable": "selection",
                    "branches": {"2": "support"}, "default": "menu"
                },
                "support": {"id": "support", "type": "play", "prompt": "support_queue", "next": "bye"},
                "bye": {"id": "bye", "type": "hangup"}
            }
        }
    }));
    let channel = Arc::new(MockChannel::new(5).with_script(vec![
        ScriptStep::Wait(Duration::from_secs(1)),
        ScriptStep::Press('2'),
    ]));

    let summary = run(Arc::clone(&channel), config).await;

    assert_eq!(summary.final_status, FinalStatus::FlowCompleted);
    assert_eq!(summary.node_history, ["menu", "route", "support", "bye"]);
    assert_eq!(
        channel.played(),
        ["ar/main_menu", "ar/support_queue"]
    );
}

#[tokio::test(start_paused = true)]
async fn silent_collect_revisits_until_retries_exhausted() {
    let config = flow(json!({
        "id": "ivr-3",
        "name": "PIN Entry",
        "extension": "2003",
        "flow": {
            "startNode": "ask",
            "nodes": {
                "ask": {
                    "id": "ask", "type": "collect", "prompt": "enter_pin",
                    "maxDigits": 4, "variable": "pin", "timeout": 5,
                    "maxRetries": 2, "onMaxRetries": "sorry", "next": "bye"
                },
                "sorry": {"id": "sorry", "type": "play", "prompt": "goodbye_retry", "next": "bye"},
                "bye": {"id": "bye", "type": "hangup"}
            }
        }
    }));
    let channel = Arc::new(MockChannel::new(1));

    let summary = run(Arc::clone(&channel), config).await;

    assert_eq!(summary.final_status, FinalStatus::FlowCompleted);
    assert_eq!(summary.node_history, ["ask", "ask", "sorry", "bye"]);
    assert!(summary.dtmf_inputs.is_empty());
}

#[tokio::test(start_paused = true)]
async fn long_prompt_keeps_the_listening_window() {
    let config = flow(json!({
        "id": "ivr-10",
        "name": "Slow Menu",
        "extension": "2010",
        "flow": {
            "startNode": "ask",
            "nodes": {
                "ask": {
                    "id": "ask", "type": "collect", "prompt": "enter_choice",
                    "maxDigits": 4, "variable": "choice", "timeout": 5,
                    "onEmpty": "empty", "next": "route"
                },
                "route": {
                    "id": "route", "type": "branch", "variable": "choice",
                    "branches": {"1": "bye"}, "default": "empty"
                },
                "empty": {"id": "empty", "type": "play", "prompt": "no_input", "next": "bye"},
                "bye": {"id": "bye", "type": "hangup"}
            }
        }
    }));
    // the 12s prompt outlasts the 5s timeout; the caller answers 2s after
    // it ends and must still land inside the window
    let channel = Arc::new(MockChannel::new(12).with_script(vec![
        ScriptStep::Wait(Duration::from_secs(14)),
        ScriptStep::Press('1'),
        ScriptStep::Press('#'),
    ]));

    let summary = run(Arc::clone(&channel), config).await;

    assert_eq!(summary.final_status, FinalStatus::FlowCompleted);
    assert_eq!(summary.node_history, ["ask", "route", "bye"]);
    assert_eq!(summary.dtmf_inputs[0].digits, "1");
}

#[tokio::test(start_paused = true)]
async fn replaying_menu_exhausts_its_retries() {
    let config = flow(json!({
        "id": "ivr-11",
        "name": "Looping Menu",
        "extension": "2011",
        "flow": {
            "startNode": "menu",
            "nodes": {
                "menu": {
                    "id": "menu", "type": "play", "prompt": "main_menu",
                    "maxRetries": 2, "onMaxRetries": "sorry", "next": "route"
                },
                "route": {
                    "id": "route", "type": "branch", "variable": "selection",
                    "branches": {"1": "bye"}, "default": "menu"
                },
                "sorry": {"id": "sorry", "type": "play", "prompt": "goodbye_retry", "next": "bye"},
                "bye": {"id": "bye", "type": "hangup"}
            }
        }
    }));
    // silent caller: the menu replays once, then the budget runs out
    let channel = Arc::new(MockChannel::new(1));

    let summary = run(Arc::clone(&channel), config).await;

    assert_eq!(summary.final_status, FinalStatus::FlowCompleted);
    assert_eq!(summary.node_history, ["menu", "route", "menu", "sorry", "bye"]);
    assert_eq!(
        channel.played(),
        ["ar/main_menu", "ar/main_menu", "ar/goodbye_retry"]
    );
}

#[tokio::test(start_paused = true)]
async fn play_into_hangup_never_counts_as_a_retry() {
    let config = flow(json!({
        "id": "ivr-12",
        "name": "Farewell",
        "extension": "2012",
        "flow": {
            "startNode": "announce",
            "nodes": {
                "announce": {
                    "id": "announce", "type": "play", "prompt": "goodbye",
                    "maxRetries": 1, "onMaxRetries": "sorry", "next": "hangup"
                },
                "sorry": {"id": "sorry", "type": "play", "prompt": "goodbye_retry", "next": "hangup"},
                "hangup": {"id": "hangup", "type": "hangup"}
            }
        }
    }));
    let channel = Arc::new(MockChannel::new(1));

    let summary = run(Arc::clone(&channel), config).await;

    assert_eq!(summary.final_status, FinalStatus::FlowCompleted);
    // the exhausted budget would route to "sorry"; a farewell play is exempt
    assert_eq!(summary.node_history, ["announce", "hangup"]);
}

#[tokio::test(start_paused = true)]
async fn account_digits_play_between_prefix_and_suffix() {
    let config = flow(json!({
        "id": "ivr-13",
        "name": "Account Readback",
        "extension": "2013",
        "flow": {
            "startNode": "seed",
            "nodes": {
                "seed": {
                    "id": "seed", "type": "set_variable",
                    "variable": "account_number", "value": "a1-53", "next": "readback"
                },
                "readback": {
                    "id": "readback", "type": "play_digits",
                    "prefix": "your_account", "variable": "account_number",
                    "suffix": "thank_you", "next": "bye"
                },
                "bye": {"id": "bye", "type": "hangup"}
            }
        }
    }));
    let channel = Arc::new(MockChannel::new(1));

    let summary = run(Arc::clone(&channel), config).await;

    assert_eq!(summary.final_status, FinalStatus::FlowCompleted);
    // non-digit characters in the stored value are skipped, not spoken
    assert_eq!(
        channel.played(),
        [
            "ar/your_account",
            "ar/digits/1",
            "ar/digits/5",
            "ar/digits/3",
            "ar/thank_you"
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn playback_failure_takes_the_error_route() {
    let config = flow(json!({
        "id": "ivr-14",
        "name": "Degraded",
        "extension": "2014",
        "flow": {
            "startNode": "welcome",
            "nodes": {
                "welcome": {
                    "id": "welcome", "type": "play", "prompt": "welcome",
                    "onError": "apology", "next": "bye"
                },
                "apology": {"id": "apology", "type": "play", "prompt": "service_unavailable", "next": "bye"},
                "bye": {"id": "bye", "type": "hangup"}
            }
        }
    }));
    let channel = Arc::new(MockChannel::new(1).with_play_failure("ar/welcome"));

    let summary = run(Arc::clone(&channel), config).await;

    assert_eq!(summary.final_status, FinalStatus::FlowCompleted);
    assert_eq!(summary.node_history, ["welcome", "apology", "bye"]);
    assert_eq!(channel.played(), ["ar/service_unavailable"]);
}

#[tokio::test(start_paused = true)]
async fn unroutable_playback_failure_fails_the_call() {
    let config = flow(json!({
        "id": "ivr-15",
        "name": "Degraded",
        "extension": "2015",
        "flow": {
            "startNode": "welcome",
            "nodes": {
                "welcome": {"id": "welcome", "type": "play", "prompt": "welcome", "next": "bye"},
                "bye": {"id": "bye", "type": "hangup"}
            }
        }
    }));
    let channel = Arc::new(MockChannel::new(1).with_play_failure("ar/welcome"));

    let summary = run(Arc::clone(&channel), config).await;

    assert_eq!(summary.final_status, FinalStatus::Error);
    assert!(!summary.completed_flow);
    assert_eq!(summary.node_history, ["welcome"]);
    // the failed leg is still ours to drop
    assert!(channel.hung_up());
}

#[tokio::test(start_paused = true)]
async fn caller_hangup_during_collect_classifies_early() {
    let channel = Arc::new(MockChannel::new(1).with_script(vec![
        ScriptStep::Wait(Duration::from_secs(3)),
        ScriptStep::HangUp,
    ]));

    let summary = run(Arc::clone(&channel), menu_flow()).await;

    assert_eq!(summary.final_status, FinalStatus::CallerHangupEarly);
    assert!(!summary.completed_flow);
    // execution stopped inside the collect node
    assert_eq!(summary.node_history, ["welcome", "ask"]);
    // a gone leg is never hung up again
    assert!(!channel.hung_up());
}

#[tokio::test(start_paused = true)]
async fn missing_next_node_ends_the_flow() {
    let config = flow(json!({
        "id": "ivr-4",
        "name": "Broken",
        "extension": "2004",
        "flow": {
            "startNode": "welcome",
            "nodes": {
                "welcome": {"id": "welcome", "type": "play", "prompt": "welcome", "next": "nowhere"}
            }
        }
    }));
    let channel = Arc::new(MockChannel::new(1));

    let summary = run(Arc::clone(&channel), config).await;

    assert_eq!(summary.final_status, FinalStatus::FlowEnded);
    assert!(!summary.completed_flow);
    assert_eq!(summary.node_history, ["welcome"]);
    assert!(channel.hung_up());
}

#[tokio::test(start_paused = true)]
async fn sequence_speaks_a_number_in_segments() {
    let config = flow(json!({
        "id": "ivr-5",
        "name": "Balance",
        "extension": "2005",
        "flow": {
            "startNode": "seed",
            "nodes": {
                "seed": {
                    "id": "seed", "type": "set_variable",
                    "variable": "balance", "value": "740.70", "next": "speak"
                },
                "speak": {
                    "id": "speak", "type": "play_sequence",
                    "sequence": [
                        {"type": "prompt", "value": "balance_is"},
                        {"type": "number", "variable": "balance"},
                        {"type": "prompt", "value": "pounds"}
                    ],
                    "next": "bye"
                },
                "bye": {"id": "bye", "type": "hangup"}
            }
        }
    }));
    let channel = Arc::new(MockChannel::new(1));

    let summary = run(Arc::clone(&channel), config).await;

    assert_eq!(summary.final_status, FinalStatus::FlowCompleted);
    assert_eq!(
        channel.played(),
        [
            "ar/balance_is",
            "ar/numbers/700",
            "ar/numbers/wa",
            "ar/numbers/40",
            "ar/pounds"
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn transfer_hands_the_leg_to_the_dialplan() {
    let config = flow(json!({
        "id": "ivr-6",
        "name": "Operator",
        "extension": "2006",
        "flow": {
            "startNode": "seed",
            "nodes": {
                "seed": {
                    "id": "seed", "type": "set_variable",
                    "variable": "operator_ext", "value": "9000", "next": "xfer"
                },
                "xfer": {
                    "id": "xfer", "type": "transfer",
                    "destination": "{{operator_ext}}"
                }
            }
        }
    }));
    let channel = Arc::new(MockChannel::new(1));

    let summary = run(Arc::clone(&channel), config).await;

    assert_eq!(summary.final_status, FinalStatus::FlowCompleted);
    assert_eq!(
        *channel.transfers.lock().unwrap(),
        [("transfer".to_string(), "9000".to_string(), 1)]
    );
    // the dialplan owns the leg now
    assert!(!channel.hung_up());
}

#[tokio::test]
async fn api_call_interpolates_url_and_flattens_result() {
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let server = tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut buf = vec![0u8; 4096];
        let n = socket.read(&mut buf).await.unwrap();
        let request = String::from_utf8_lossy(&buf[..n]).to_string();
        let body = r#"{"balance":"740.70","currency":"EGP"}"#;
        let response = format!(
            "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
            body.len(),
            body
        );
        socket.write_all(response.as_bytes()).await.unwrap();
        request
    });

    let config = flow(json!({
        "id": "ivr-7",
        "name": "Balance Lookup",
        "extension": "2007",
        "flow": {
            "startNode": "seed",
            "nodes": {
                "seed": {
                    "id": "seed", "type": "set_variable",
                    "variable": "account_number", "value": "153", "next": "lookup"
                },
                "lookup": {
                    "id": "lookup", "type": "api_call",
                    "url": format!("http://{addr}/balance?acct={{{{account_number}}}}"),
                    "resultVariable": "balance_result",
                    "next": "speak"
                },
                "speak": {
                    "id": "speak", "type": "play_sequence",
                    "sequence": [{"type": "number", "variable": "balance_result.balance"}],
                    "next": "bye"
                },
                "bye": {"id": "bye", "type": "hangup"}
            }
        }
    }));
    let channel = Arc::new(MockChannel::new(0));

    let summary = run(Arc::clone(&channel), config).await;

    let request = server.await.unwrap();
    assert!(
        request.starts_with("GET /balance?acct=153 "),
        "unexpected request line: {request}"
    );
    assert_eq!(summary.final_status, FinalStatus::FlowCompleted);
    assert_eq!(summary.api_calls.len(), 1);
    assert_eq!(summary.api_calls[0].status, Some(200));
    assert_eq!(summary.api_calls[0].url, format!("http://{addr}/balance?acct=153"));
    // flattened result drives the spoken amount
    assert_eq!(
        channel.played(),
        ["ar/numbers/700", "ar/numbers/wa", "ar/numbers/40"]
    );
}

struct CapturingSink(std::sync::Mutex<Vec<CallSummary>>);

#[async_trait::async_trait]
impl ivr_engine_reporting::SummarySink for CapturingSink {
    async fn record(
        &self,
        summary: &CallSummary,
    ) -> Result<(), ivr_engine_reporting::ReportError> {
        self.0.lock().unwrap().push(summary.clone());
        Ok(())
    }
}

#[tokio::test(start_paused = true)]
async fn summary_is_delivered_to_the_sink() {
    let channel = Arc::new(MockChannel::new(1).with_script(vec![
        ScriptStep::Wait(Duration::from_secs(3)),
        ScriptStep::Press('1'),
        ScriptStep::Press('#'),
    ]));
    let sink = Arc::new(CapturingSink(std::sync::Mutex::new(Vec::new())));

    let summary = FlowRunner::new(Arc::clone(&channel) as Arc<dyn Channel>, menu_flow(), Settings::default())
        .with_sink(Arc::clone(&sink) as Arc<dyn ivr_engine_reporting::SummarySink>)
        .run()
        .await;

    let recorded = sink.0.lock().unwrap();
    assert_eq!(recorded.len(), 1);
    assert_eq!(recorded[0].node_history, summary.node_history);
    assert_eq!(recorded[0].final_status, FinalStatus::FlowCompleted);
}

#[tokio::test]
async fn unreachable_tracker_never_affects_the_call() {
    let config = flow(json!({
        "id": "ivr-9",
        "name": "Survey",
        "extension": "2009",
        "flow": {
            "startNode": "thanks",
            "nodes": {
                "thanks": {"id": "thanks", "type": "play", "prompt": "thanks", "next": "bye"},
                "bye": {"id": "bye", "type": "hangup"}
            }
        }
    }));
    // outbound correlation id present, but the platform api is unreachable
    let channel =
        Arc::new(MockChannel::new(0).with_channel_var("OUTBOUND_CALL_ID", "oc-42"));
    let mut settings = Settings::default();
    settings.platform_api_url = "http://127.0.0.1:1".to_string();

    let summary = FlowRunner::new(Arc::clone(&channel) as Arc<dyn Channel>, config, settings)
        .run()
        .await;

    assert_eq!(summary.final_status, FinalStatus::FlowCompleted);
    assert_eq!(summary.node_history, ["thanks", "bye"]);
}

#[tokio::test]
async fn failed_api_call_takes_the_error_route() {
    let config = flow(json!({
        "id": "ivr-8",
        "name": "Balance Lookup",
        "extension": "2008",
        "flow": {
            "startNode": "lookup",
            "nodes": {
                "lookup": {
                    "id": "lookup", "type": "api_call",
                    "url": "http://127.0.0.1:1/unreachable",
                    "onError": "apology",
                    "next": "bye"
                },
                "apology": {"id": "apology", "type": "play", "prompt": "service_unavailable", "next": "bye"},
                "bye": {"id": "bye", "type": "hangup"}
            }
        }
    }));
    let channel = Arc::new(MockChannel::new(0));

    let summary = run(Arc::clone(&channel), config).await;

    assert_eq!(summary.final_status, FinalStatus::FlowCompleted);
    assert_eq!(summary.node_history, ["lookup", "apology", "bye"]);
    assert_eq!(summary.api_calls.len(), 1);
    assert!(summary.api_calls[0].error.is_some());
}
