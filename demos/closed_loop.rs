use std::{collections::BTreeMap, fs::File, io::BufWriter, sync::Arc};

use fixed::types::I1F15;
use pireg::{
    carrier::{CarrierConfig, CarrierMode, Polarity},
    dispatch::ControlLoop,
    pi::PiConfig,
    sampler,
};
use serde::Serialize;

#[derive(Serialize)]
struct Values {
    time_ns: u64,
    setpoint: f32,
    raw_feedback: u16,
    feedback: f32,
    duty_ticks: u16,
    duty_per_unit: f32,
    integrator: f32,
    saturation_engaged: bool,
    missed_samples: u32,
}

fn main() -> Result<(), anyhow::Error> {
    let mut writer = mcap::Writer::new(BufWriter::new(File::create("out.mcap")?))?;
    let my_channel = mcap::Channel {
        topic: String::from("pireg"),
        schema: Some(Arc::new(mcap::Schema {
            name: "".to_owned(),
            encoding: "".to_owned(),
            data: std::borrow::Cow::default(),
        })),
        message_encoding: "cbor".to_owned(),
        metadata: BTreeMap::default(),
    };
    let channel_id = writer.add_channel(&my_channel)?;

    // 10 kHz carrier on a 40 MHz time base, sampled at the pulse centre.
    let mut ctl = ControlLoop::new(
        CarrierConfig {
            period_ticks: 4000,
            mode: CarrierMode::CenterAligned,
            dead_time_ticks: 20,
            polarity: Polarity::ActiveHigh,
        },
        PiConfig {
            kp: I1F15::from_num(0.5),
            ki: I1F15::from_num(0.1),
            setpoint: I1F15::from_num(0.5),
            output_min: I1F15::ZERO,
            output_max: I1F15::MAX,
        },
        0,
    )?;
    ctl.start();

    let max_duty = f64::from(ctl.carrier().max_duty());
    let dt_ns = 100_000; // one 10 kHz carrier period
    let mut time_ns: u64 = 0;

    // First-order plant: the output voltage lags the commanded duty.
    let mut plant = 0.0f64;

    while time_ns <= 200_000_000 {
        // Step the setpoint down halfway through the run.
        if time_ns == 100_000_000 {
            ctl.controller_mut().set_setpoint(I1F15::from_num(0.3));
        }

        let raw_feedback = (plant * f64::from(sampler::RAW_MAX)) as u16;
        let duty = ctl
            .run_cycle(raw_feedback)
            .expect("carrier is running");

        let target = f64::from(duty.ticks()) / max_duty;
        plant += (target - plant) * 0.05;

        let diag = ctl.snapshot();
        let mut buffer = Vec::with_capacity(128);
        ciborium::into_writer(
            &Values {
                time_ns,
                setpoint: ctl.controller().setpoint().to_num(),
                raw_feedback,
                feedback: sampler::to_fixed(raw_feedback).to_num(),
                duty_ticks: duty.ticks(),
                duty_per_unit: (f64::from(duty.ticks()) / max_duty) as f32,
                integrator: ctl.controller().integrator().to_num(),
                saturation_engaged: diag.saturation_engaged,
                missed_samples: diag.missed_samples,
            },
            &mut buffer,
        )
        .unwrap();
        writer
            .write_to_known_channel(
                &mcap::records::MessageHeader {
                    channel_id,
                    sequence: 0,
                    log_time: time_ns,
                    publish_time: time_ns,
                },
                &buffer,
            )
            .unwrap();

        time_ns += dt_ns;
    }

    writer.finish().unwrap();

    Ok(())
}
