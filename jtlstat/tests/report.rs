use std::{fs, path::Path};

use jtlstat::config::Config;
use jtlstat_engine::{CancellationToken, Options, bucket::BucketValueMode};
use serde_json::Value;

const JTL: &str = "\
timeStamp,elapsed,label,responseCode,responseMessage,threadName,success,bytes,sentBytes,allThreads,Latency
1700000000000,100,Login,200,OK,Group 1-1,true,1000,100,1,90
1700000000500,300,Home,500,,Group 1-1,false,2000,200,1,250
1700000001000,200,Login,200,OK,Group 1-2,true,1000,100,2,150
,50,Login,200,OK,Group 1-2,true,1000,100,2,40
1700000002000,300,Login,404,,Group 1-2,false,0,100,2,10
1700000002100,150,Home,200,OK,Group 1-1,true,1500,150,2,120
";

fn analyze(path: &Path, options: Options) -> jtlstat_engine::Analysis {
    jtlstat::analyze_file(path, &Config::default(), options, &CancellationToken::new())
        .expect("analysis succeeds")
}

#[test]
fn csv_report_end_to_end() {
    let dir = tempfile::tempdir().expect("temp dir");
    let path = dir.path().join("run.jtl");
    fs::write(&path, JTL).expect("write input");

    let analysis = analyze(&path, Options::default());
    assert_eq!(analysis.stats.accepted, 5);
    assert_eq!(analysis.stats.rejected, 1);

    let json: Value = serde_json::to_value(&analysis.report).expect("serializable");
    assert_eq!(json["successCount"], 3);
    assert_eq!(json["errorCount"], 2);
    assert_eq!(json["startTime"], "14/11/2023, 22:13:20");
    assert_eq!(json["endTime"], "14/11/2023, 22:13:22");
    assert_eq!(json["labels"], serde_json::json!(["Login", "Home"]));

    let login = &json["aggregateReport"][0];
    assert_eq!(login["label"], "Login");
    assert_eq!(login["count"], 3);
    assert_eq!(login["average"], 200);
    assert_eq!(login["median"], 200);
    assert_eq!(login["min"], 100);
    assert_eq!(login["max"], 300);
    assert_eq!(login["errorRate"], 33.33);
    assert_eq!(login["throughput"], 1.43);

    let errors = &json["errorDetails"];
    assert_eq!(
        errors,
        &serde_json::json!([
            {"code": "500", "message": "Internal Server Error", "count": 1},
            {"code": "404", "message": "Not Found", "count": 1},
        ])
    );

    let series = json["timeSeriesData"].as_array().expect("series array");
    assert_eq!(series.len(), 3);
    assert_eq!(series[0]["time"], "22:13:20");
    assert_eq!(series[0]["originalTime"], 1_700_000_000_000_i64);
    assert_eq!(series[0]["requestsPerSecond_Login"], 1);
    assert_eq!(series[0]["requestsPerSecond_Home"], 1);
    assert_eq!(series[0]["errorsPerSecond_Home"], 1);
    assert_eq!(
        series[0]["errorDetails_Home"],
        serde_json::json!({"500: Internal Server Error": 1})
    );
    assert_eq!(series[2]["checksPerSecond_Home"], 1);
    assert_eq!(series[2]["activeThreads_Login"], 2);

    let ramp = &json["rampUpInfo"];
    assert_eq!(ramp["users"], 2);
    assert_eq!(ramp["usersPerTest"], 2);
    assert_eq!(ramp["duration"], "1s");
}

#[test]
fn compressed_jsonl_matches_csv() {
    let dir = tempfile::tempdir().expect("temp dir");
    let csv_path = dir.path().join("run.jtl");
    fs::write(&csv_path, JTL).expect("write csv");

    let mut lines = String::new();
    let mut reader = csv::Reader::from_reader(JTL.as_bytes());
    let headers = reader.headers().expect("headers").clone();
    for record in reader.records() {
        let record = record.expect("record");
        let object: serde_json::Map<String, Value> = headers
            .iter()
            .zip(record.iter())
            .map(|(h, v)| (h.to_string(), Value::String(v.to_string())))
            .collect();
        lines.push_str(&serde_json::to_string(&object).expect("serializable"));
        lines.push('\n');
    }
    let jsonl_path = dir.path().join("run.jsonl.zst");
    let compressed = zstd::stream::encode_all(lines.as_bytes(), 3).expect("compress");
    fs::write(&jsonl_path, compressed).expect("write jsonl");

    let from_csv = analyze(&csv_path, Options::default());
    let from_jsonl = analyze(&jsonl_path, Options::default());
    assert_eq!(from_csv, from_jsonl);
}

#[test]
fn repeated_runs_are_byte_identical() {
    let dir = tempfile::tempdir().expect("temp dir");
    let path = dir.path().join("run.jtl");
    fs::write(&path, JTL).expect("write input");

    let options = Options {
        bucket_values: BucketValueMode::Mean,
        ..Options::default()
    };
    let first = serde_json::to_string(&analyze(&path, options.clone()).report).expect("json");
    let second = serde_json::to_string(&analyze(&path, options).report).expect("json");
    assert_eq!(first, second);
}

#[test]
fn header_only_input_is_an_empty_report() {
    let dir = tempfile::tempdir().expect("temp dir");
    let path = dir.path().join("empty.csv");
    fs::write(&path, "timeStamp,label,elapsed\n").expect("write input");

    let analysis = analyze(&path, Options::default());
    assert_eq!(analysis.stats.accepted, 0);
    let json = serde_json::to_value(&analysis.report).expect("serializable");
    assert_eq!(json["startTime"], "");
    assert_eq!(json["aggregateReport"], serde_json::json!([]));
    assert_eq!(json["rampUpInfo"]["duration"], "0s");
}

#[test]
fn padded_labels_are_distinct() {
    let dir = tempfile::tempdir().expect("temp dir");
    let path = dir.path().join("padded.csv");
    fs::write(&path, "timeStamp,label,success\n1000, Home ,true\n2000,Home,true\n")
        .expect("write input");

    let analysis = analyze(&path, Options::default());
    assert_eq!(
        analysis.report.labels,
        vec![" Home ".to_string(), "Home".to_string()]
    );
}
