use amf::data::AccessType;
use amf::expect_nas;
use amf::protocols::ngap::{NasCause, NgapMessage};
use amf_tests::{MockUe, framework::*};
use anyhow::{anyhow, bail};

#[async_std::test]
async fn unanswered_authentication_request_is_resent_then_abandoned() -> anyhow::Result<()> {
    let (amf, gnb, network, logger) = init_with(|config| config.t3560 = short_timer())?;
    let mut ue = MockUe::new(1, &amf, &gnb, &network, &logger);
    ue.send_registration_request(false).await?;

    // When the UE never answers the challenge
    let first = ue.receive_authentication_request().await?;

    // Then the same request is sent on each T3560 expiry
    for _ in 0..short_timer().max_retry_times {
        let resent = ue.receive_authentication_request().await?;
        assert_eq!(resent.rand, first.rand);
    }

    // And after the last one the UE is released and removed.
    let pdu = gnb.receive_ngap().await?;
    let NgapMessage::UeContextReleaseCommand(cause) = pdu.message else {
        bail!("Expected UE Context Release Command, got {}", pdu.message.name())
    };
    assert_eq!(cause, NasCause::Unspecified);
    wait_for_ue_count(&amf, 0).await
}

#[async_std::test]
async fn unacknowledged_registration_accept_is_resent() -> anyhow::Result<()> {
    let (amf, gnb, network, logger) = init_with(|config| config.t3550 = short_timer())?;
    let mut ue = MockUe::new(1, &amf, &gnb, &network, &logger);
    ue.send_registration_request(false).await?;
    ue.handle_authentication().await?;
    ue.handle_security_mode().await?;

    // When the UE never sends Registration Complete
    let accept = expect_nas!(RegistrationAccept, ue.receive_nas().await?.message)?;

    // Then the accept is repeated with the same GUTI on each T3550 expiry
    for _ in 0..short_timer().max_retry_times {
        let resent = expect_nas!(RegistrationAccept, ue.receive_nas().await?.message)?;
        assert_eq!(resent.guti, accept.guti);
    }

    // And then the AMF gives up waiting but keeps the UE registered.
    gnb.expect_no_ngap().await?;
    assert_eq!(amf.ue_count(), 1);
    Ok(())
}

#[async_std::test]
async fn unanswered_network_deregistration_removes_ue() -> anyhow::Result<()> {
    let (amf, gnb, network, logger) = init_with(|config| config.t3522 = short_timer())?;
    let mut ue = MockUe::new(1, &amf, &gnb, &network, &logger);
    ue.register(true).await?;

    // When the network deregisters the UE and it never answers
    amf.network_initiated_deregistration(&ue.imsi, AccessType::ThreeGpp)
        .await?;
    for _ in 0..=short_timer().max_retry_times {
        let nas = ue.receive_nas().await?;
        expect_nas!(DeregistrationRequestToUe, nas.message)?;
    }

    // Then, once T3522 has run out, the UE is deregistered locally.
    wait_for_ue_count(&amf, 0).await?;
    gnb.expect_no_ngap().await
}
