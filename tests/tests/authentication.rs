use amf::protocols::nas::cause;
use amf::protocols::ngap::NasCause;
use amf_tests::{MockUe, framework::*};

// 14 bytes of AUTS (TS33.102, 6.3.3).  The simulated AUSF does not check it.
fn auts() -> Option<Vec<u8>> {
    Some(vec![0x5a; 14])
}

#[async_std::test]
async fn second_synch_failure_is_rejected() -> anyhow::Result<()> {
    let (amf, gnb, network, logger) = init()?;
    let mut ue = MockUe::new(1, &amf, &gnb, &network, &logger);
    ue.send_registration_request(false).await?;

    // When the USIM finds the challenge out of sequence twice running
    let first = ue
        .refuse_authentication(cause::SYNCH_FAILURE, auts())
        .await?;
    let second = ue
        .refuse_authentication(cause::SYNCH_FAILURE, auts())
        .await?;

    // Then the AMF resynchronizes once, with a new challenge, and then gives up.
    assert_ne!(first, second);
    assert_eq!(network.resynchronization_count(), 1);
    ue.receive_authentication_reject().await?;
    gnb.expect_no_ngap().await
}

#[async_std::test]
async fn ngksi_in_use_is_retried_with_next_ksi() -> anyhow::Result<()> {
    let (amf, gnb, network, logger) = init()?;
    let mut ue = MockUe::new(1, &amf, &gnb, &network, &logger);
    ue.send_registration_request(false).await?;

    // When the UE says the ngKSI of the first challenge is taken
    let rand = ue
        .refuse_authentication(cause::NGKSI_ALREADY_IN_USE, None)
        .await?;

    // Then the same challenge comes again under the next KSI and registration goes ahead.
    let request = ue.handle_authentication().await?;
    assert_eq!(request.rand, Some(rand));
    assert_eq!(request.ngksi.ksi, 1);
    assert_eq!(network.resynchronization_count(), 0);
    ue.handle_security_mode().await?;
    ue.handle_registration_accept().await?;
    assert_eq!(ue.handle_ue_context_release().await?, NasCause::NormalRelease);
    Ok(())
}

#[async_std::test]
async fn security_mode_reject_releases_ue() -> anyhow::Result<()> {
    let (amf, gnb, network, logger) = init()?;
    let mut ue = MockUe::new(1, &amf, &gnb, &network, &logger);
    ue.send_registration_request(false).await?;
    ue.handle_authentication().await?;

    // When the UE rejects the Security Mode Command
    ue.reject_security_mode().await?;

    // Then the AMF releases the signalling connection and forgets the UE.
    assert_eq!(ue.handle_ue_context_release().await?, NasCause::NormalRelease);
    wait_for_ue_count(&amf, 0).await
}
