use criterion::{black_box, criterion_group, criterion_main, Criterion, SamplingMode};
use rayon::prelude::*;
use secp256k1::Keypair;
use std::thread::available_parallelism;
use txscript::caches::Cache;
use txscript::flags::ScriptFlags;
use txscript::sign::{SigHashFlags, SigHashType};
use txscript::standard::pay_to_pubkey_hash_script;
use txscript::tx::{OutPoint, PrevOutputs, Transaction, TxIn, TxOut};
use txscript::{verify_script, VerifyContext};

/// Builds a transaction whose inputs are all P2PKH spends, optionally sharing
/// a single keypair across a tail of inputs to exercise the signature cache.
fn mock_tx(inputs_count: usize, non_uniq_signatures: usize) -> (Transaction, PrevOutputs) {
    let secp = secp256k1::Secp256k1::new();
    let mut prev_outs = Vec::new();
    let mut inputs = Vec::new();
    let mut keys_per_input = Vec::new();
    let shared_key = Keypair::new(&secp, &mut rand::thread_rng());

    for i in 0..inputs_count {
        let kp = if i >= inputs_count - non_uniq_signatures { shared_key } else { Keypair::new(&secp, &mut rand::thread_rng()) };
        let pubkey = kp.public_key();
        prev_outs.push(TxOut::new(50_000, pay_to_pubkey_hash_script(&pubkey.serialize())));
        inputs.push(TxIn::new(OutPoint::new([i as u8; 32], 0), vec![], 0xffffffff, vec![]));
        keys_per_input.push(kp);
    }

    let mut tx = Transaction::new(2, inputs, vec![TxOut::new(49_000 * inputs_count as u64, vec![])], 0);
    let prev_outputs = PrevOutputs::new(prev_outs);
    let hash_type = SigHashFlags { base: SigHashType::All, anyone_can_pay: false };

    for (i, kp) in keys_per_input.iter().enumerate() {
        let script_pub_key = &prev_outputs.as_slice()[i].script_pub_key;
        let sig_hash = txscript::sighash::legacy_sighash(&tx, i, script_pub_key, hash_type).unwrap();
        let message = secp256k1::Message::from_digest(sig_hash.0);
        let sig = secp.sign_ecdsa(&message, &kp.secret_key());
        let mut sig_bytes = sig.serialize_der().to_vec();
        sig_bytes.push(hash_type.to_byte());
        tx.inputs[i].signature_script =
            txscript::script_builder::ScriptBuilder::new().add_data(&sig_bytes).unwrap().add_data(&kp.public_key().serialize()).unwrap().drain();
    }
    (tx, prev_outputs)
}

fn verify_all_single_threaded(tx: &Transaction, prev_outputs: &PrevOutputs, cache: &txscript::engine::SigCache) {
    for i in 0..tx.inputs.len() {
        let ctx = VerifyContext { tx, input_index: i, prev_outputs, sig_cache: cache, flags: ScriptFlags::STANDARD };
        verify_script(&ctx, &tx.inputs[i].signature_script, &prev_outputs.as_slice()[i].script_pub_key, prev_outputs.as_slice()[i].value)
            .unwrap();
    }
}

fn verify_all_par_iter(tx: &Transaction, prev_outputs: &PrevOutputs, cache: &txscript::engine::SigCache) {
    (0..tx.inputs.len()).into_par_iter().for_each(|i| {
        let ctx = VerifyContext { tx, input_index: i, prev_outputs, sig_cache: cache, flags: ScriptFlags::STANDARD };
        verify_script(&ctx, &tx.inputs[i].signature_script, &prev_outputs.as_slice()[i].script_pub_key, prev_outputs.as_slice()[i].value)
            .unwrap();
    });
}

fn benchmark_verify_scripts(c: &mut Criterion) {
    for inputs_count in [100, 50, 25, 10, 5, 2] {
        for non_uniq_signatures in [0, inputs_count / 2] {
            let (tx, prev_outputs) = mock_tx(inputs_count, non_uniq_signatures);
            let mut group = c.benchmark_group(format!("inputs: {inputs_count}, non uniq: {non_uniq_signatures}"));
            group.sampling_mode(SamplingMode::Flat);

            group.bench_function("single_thread", |b| {
                let cache = Cache::new(inputs_count as u64);
                b.iter(|| {
                    cache.clear();
                    verify_all_single_threaded(black_box(&tx), black_box(&prev_outputs), &cache);
                })
            });

            group.bench_function("rayon par iter", |b| {
                let cache = Cache::new(inputs_count as u64);
                b.iter(|| {
                    cache.clear();
                    verify_all_par_iter(black_box(&tx), black_box(&prev_outputs), &cache);
                })
            });

            for i in (2..=available_parallelism().unwrap().get()).step_by(2) {
                if inputs_count >= i {
                    let pool = rayon::ThreadPoolBuilder::new().num_threads(i).build().unwrap();
                    group.bench_function(&format!("rayon, custom threadpool, thread count {i}"), |b| {
                        let cache = Cache::new(inputs_count as u64);
                        b.iter(|| {
                            cache.clear();
                            pool.install(|| verify_all_par_iter(black_box(&tx), black_box(&prev_outputs), &cache));
                        })
                    });
                }
            }
        }
    }
}

criterion_group! {
    name = benches;
    config = Criterion::default().with_output_color(true).measurement_time(std::time::Duration::new(20, 0));
    targets = benchmark_verify_scripts
}

criterion_main!(benches);
